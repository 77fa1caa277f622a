//! Command surface for application shells
//!
//! Methods arrive as a name plus JSON arguments and return a JSON result,
//! mirroring the method-channel convention of the shells this crate
//! bridges. Errors carry a reason code via [`WgCtlError::code`].

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::controller::{LifecycleController, StageSink};
use crate::error::{WgCtlError, WgCtlResult};

pub struct CommandDispatcher {
    controller: Arc<LifecycleController>,
}

impl CommandDispatcher {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    /// Register the stage event subscription
    pub async fn on_listen(&self, sink: StageSink) {
        self.controller.on_listen(sink).await;
    }

    /// Cancel the stage event subscription
    pub async fn on_cancel(&self) {
        self.controller.on_cancel().await;
    }

    /// Dispatch one command
    pub async fn handle(&self, method: &str, args: &Value) -> WgCtlResult<Value> {
        debug!("Dispatching method: {}", method);
        match method {
            "initialize" => {
                let name = required_str(args, "localizedDescription")?;
                self.controller.initialize(name).await?;
                Ok(Value::Null)
            }
            "start" => {
                let config_text = required_str(args, "wgQuickConfig")?;
                self.controller.connect(config_text).await?;
                Ok(json!(""))
            }
            "stop" => {
                self.controller.disconnect().await?;
                Ok(json!(""))
            }
            "stage" => Ok(json!(self.controller.status().await.as_str())),
            "checkPermission" => {
                self.controller.check_permission();
                Ok(Value::Null)
            }
            "getDownloadData" => {
                let stats = self.controller.traffic().await?;
                Ok(json!(stats.rx_bytes))
            }
            "getUploadData" => {
                let stats = self.controller.traffic().await?;
                Ok(json!(stats.tx_bytes))
            }
            other => Err(WgCtlError::UnknownMethod(other.to_string())),
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> WgCtlResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| WgCtlError::InvalidParameter(format!("missing argument '{}'", key)))
}
