use dbviz_core::OperationError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes a project configuration object. `null` yields the defaults.
pub(crate) fn decode_config<T>(config: &Value) -> Result<T, OperationError>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    T::deserialize(config).map_err(|err| OperationError::InvalidConfig {
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        size: u32,
    }

    #[test]
    fn null_means_defaults() {
        assert_eq!(decode_config::<Sample>(&Value::Null).unwrap(), Sample::default());
    }

    #[test]
    fn wrong_shape_is_invalid_config() {
        let err = decode_config::<Sample>(&json!({ "size": "big" })).unwrap_err();
        assert!(matches!(err, OperationError::InvalidConfig { .. }));
    }
}
