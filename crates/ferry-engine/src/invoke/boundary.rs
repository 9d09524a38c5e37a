//! Failure-isolating call boundary

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use ferry_sdk::{HostError, HostResult};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "host member panicked".to_string()
    }
}

/// Run a host call, turning a panic into a [`HostError`] of kind `Panic`
pub fn call_guarded<T, F>(f: F) -> HostResult<T>
where
    F: FnOnce() -> HostResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!(target: "ferry::invoke", "host call panicked: {}", message);
            Err(HostError::panic(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_sdk::HostErrorKind;

    #[test]
    fn test_ok_passes_through() {
        assert_eq!(call_guarded(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_error_passes_through() {
        let err = call_guarded::<(), _>(|| Err(HostError::invalid_argument("bad"))).unwrap_err();
        assert_eq!(err.kind, HostErrorKind::InvalidArgument);
    }

    #[test]
    fn test_panic_is_caught() {
        let err = call_guarded::<(), _>(|| panic!("exploded")).unwrap_err();
        assert_eq!(err.kind, HostErrorKind::Panic);
        assert_eq!(err.message, "exploded");

        let n = 7;
        let err = call_guarded::<(), _>(|| panic!("code {}", n)).unwrap_err();
        assert_eq!(err.message, "code 7");
    }
}
