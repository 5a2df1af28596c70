//! Device operations. All of them authenticate with the bearer token.

use std::fmt;

use crate::builder::segment;
use crate::client::Client;
use crate::error::Outcome;
use crate::operation::Operation;

/// Argument passed to a device function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArg {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for FunctionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionArg::Text(s) => f.write_str(s),
            FunctionArg::Int(n) => write!(f, "{n}"),
            FunctionArg::Float(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FunctionArg {
    fn from(value: &str) -> Self {
        FunctionArg::Text(value.to_string())
    }
}

impl From<String> for FunctionArg {
    fn from(value: String) -> Self {
        FunctionArg::Text(value)
    }
}

impl From<i32> for FunctionArg {
    fn from(value: i32) -> Self {
        FunctionArg::Int(value.into())
    }
}

impl From<i64> for FunctionArg {
    fn from(value: i64) -> Self {
        FunctionArg::Int(value)
    }
}

impl From<f64> for FunctionArg {
    fn from(value: f64) -> Self {
        FunctionArg::Float(value)
    }
}

fn device_path(id: &str) -> String {
    format!("devices/{}", segment(id))
}

fn member_path(id: &str, name: &str) -> String {
    format!("{}/{}", device_path(id), segment(name))
}

impl Client {
    pub async fn list_devices(&self) -> Outcome {
        self.request(Operation::get("devices")).await
    }

    pub async fn get_device(&self, id: &str) -> Outcome {
        self.request(Operation::get(device_path(id))).await
    }

    /// Read the cloud variable `name` of device `id`.
    pub async fn get_variable(&self, id: &str, name: &str) -> Outcome {
        self.request(Operation::get(member_path(id, name))).await
    }

    /// Invoke function `name` on device `id` without an argument.
    pub async fn call_function(&self, id: &str, name: &str) -> Outcome {
        self.request(Operation::post(member_path(id, name))).await
    }

    /// Invoke function `name` on device `id`, sending `arg` as `args`.
    ///
    /// A `return_value` of -1 in the answer surfaces as
    /// [`Error::ActionFailed`](crate::Error::ActionFailed), payload attached.
    pub async fn call_function_with(
        &self,
        id: &str,
        name: &str,
        arg: impl Into<FunctionArg>,
    ) -> Outcome {
        let op = Operation::post(member_path(id, name)).form("args", arg.into().to_string());
        self.request(op).await
    }

    pub async fn rename_device(&self, id: &str, name: &str) -> Outcome {
        self.request(Operation::put(device_path(id)).form("name", name)).await
    }

    /// Claim an unowned device into the account.
    pub async fn claim_device(&self, id: &str) -> Outcome {
        self.request(Operation::post("devices").form("id", id)).await
    }

    pub async fn remove_device(&self, id: &str) -> Outcome {
        self.request(Operation::delete(device_path(id))).await
    }
}
