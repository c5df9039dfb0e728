use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Run `future`, turning a panic inside it into an `Err` with the panic message.
///
/// Long-lived tasks wrap each unit of work in this so one bad cycle cannot
/// end the task.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<Box<dyn std::error::Error + Send>>() {
        e.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}
