// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// Drop every zero valued curve parameter of a host QoS definition.
///
/// A zero rate, burst or delay is how the kernel reports an unset HFSC
/// parameter:
/// ```yml
/// out:
///   ul:
///     m1: 0
///     d: 0
///     m2: 8000000
/// ```
/// becomes `{out: {ul: {m2: 8000000}}}`. Values which are not mappings of
/// mappings are kept as they are.
pub(crate) fn remove_zero_values_in_net_qos(net_qos: &Value) -> Value {
    let Value::Object(parts) = net_qos else {
        return net_qos.clone();
    };
    let mut stripped_qos = serde_json::Map::new();
    for (part, part_config) in parts {
        let stripped_part = match part_config {
            Value::Object(curves) => Value::Object(
                curves
                    .iter()
                    .map(|(curve, curve_config)| {
                        (curve.clone(), remove_zero_values(curve_config))
                    })
                    .collect(),
            ),
            v => v.clone(),
        };
        stripped_qos.insert(part.clone(), stripped_part);
    }
    Value::Object(stripped_qos)
}

fn remove_zero_values(curve_config: &Value) -> Value {
    match curve_config {
        Value::Object(params) => Value::Object(
            params
                .iter()
                .filter(|(_, v)| !is_zero(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        v => v.clone(),
    }
}

fn is_zero(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}
