use thiserror::Error;

use crate::gfx::HalaGfxError;

/// The error type of the hala-retained crate.
#[derive(Error, Debug)]
pub struct HalaRendererError {
  msg: String,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The implementation of the error type of the hala-retained crate.
impl HalaRendererError {
  /// Create a new error.
  /// param msg: The message of the error.
  /// param source: The source of the error.
  /// return: The error.
  pub fn new(msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      msg: msg.to_string(),
      source,
    }
  }

  pub fn message(&self) -> &str {
    &self.msg
  }

  /// Check whether the error was caused by a GPU allocation failure.
  /// return: True if the GPU ran out of memory.
  pub fn is_out_of_memory(&self) -> bool {
    match self.source.as_ref() {
      Some(err) => {
        if let Some(err) = err.downcast_ref::<HalaGfxError>() {
          err.is_out_of_memory()
        } else if let Some(err) = err.downcast_ref::<HalaRendererError>() {
          err.is_out_of_memory()
        } else {
          false
        }
      },
      None => false,
    }
  }
}

impl std::convert::From<HalaGfxError> for HalaRendererError {
  fn from(err: HalaGfxError) -> Self {
    Self {
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

impl std::convert::From<serde_json::Error> for HalaRendererError {
  fn from(err: serde_json::Error) -> Self {
    Self {
      msg: format!("Parse configuration failed: {}", err),
      source: Some(Box::new(err)),
    }
  }
}

impl std::convert::From<std::io::Error> for HalaRendererError {
  fn from(err: std::io::Error) -> Self {
    Self {
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

/// The implementation Display trait for the error type of the hala-retained crate.
impl std::fmt::Display for HalaRendererError {
  /// Format the error.
  /// param f: The formatter.
  /// return: The result.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.msg)
  }
}
