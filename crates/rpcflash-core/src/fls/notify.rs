//! Job completion callbacks

/// Receiver of job completion events
///
/// Called from [`Fls::main_function`](super::Fls::main_function) with the
/// driver lock held, so implementations must not submit new requests.
pub trait JobNotification {
    /// A job finished successfully
    fn job_end(&mut self) {}

    /// A job failed
    fn job_error(&mut self) {}
}

impl JobNotification for () {}

impl<T: JobNotification + ?Sized> JobNotification for &mut T {
    fn job_end(&mut self) {
        (**self).job_end()
    }

    fn job_error(&mut self) {
        (**self).job_error()
    }
}
