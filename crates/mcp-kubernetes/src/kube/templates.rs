use k8s_openapi::api::core::v1::Container;

use crate::error::AppError;

/// Named container templates accepted by the create tools. `custom`
/// requires an explicit image and optional command from the caller.
pub const TEMPLATE_NAMES: &[&str] = &["nginx", "busybox", "alpine", "custom"];

#[derive(Debug)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Option<Vec<String>>,
}

pub fn resolve_template(
    template: &str,
    custom_image: Option<&str>,
    custom_command: Option<Vec<String>>,
) -> Result<ContainerSpec, AppError> {
    match template {
        "nginx" => Ok(ContainerSpec {
            image: "nginx:stable".to_string(),
            command: None,
        }),
        "busybox" => Ok(ContainerSpec {
            image: "busybox:stable".to_string(),
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "sleep infinity".to_string(),
            ]),
        }),
        "alpine" => Ok(ContainerSpec {
            image: "alpine:latest".to_string(),
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "sleep infinity".to_string(),
            ]),
        }),
        "custom" => {
            let image = custom_image.ok_or_else(|| {
                AppError::InvalidRequest(
                    "template \"custom\" requires an explicit image".to_string(),
                )
            })?;
            Ok(ContainerSpec {
                image: image.to_string(),
                command: custom_command,
            })
        }
        other => Err(AppError::InvalidRequest(format!(
            "unknown template: {other} (expected one of {})",
            TEMPLATE_NAMES.join(", ")
        ))),
    }
}

impl ContainerSpec {
    pub fn to_container(&self, name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(self.image.clone()),
            command: self.command.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_templates_resolve() {
        for name in ["nginx", "busybox", "alpine"] {
            assert!(resolve_template(name, None, None).is_ok());
        }
    }

    #[test]
    fn unknown_template_is_invalid_request() {
        let err = resolve_template("postgres", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn custom_template_requires_image() {
        let err = resolve_template("custom", None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let spec = resolve_template("custom", Some("redis:7"), None).unwrap();
        assert_eq!(spec.image, "redis:7");
    }
}
