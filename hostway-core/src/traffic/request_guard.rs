use crate::upstream::HostRef;

/// Counts one in-flight request against a host for as long as it lives.
#[derive(Debug)]
pub struct ActiveRequest {
    host: HostRef,
    finished: bool,
}

impl ActiveRequest {
    pub fn start(host: &HostRef) -> Self {
        host.inc_active_requests();

        Self {
            host: host.clone(),
            finished: false,
        }
    }

    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// End the request now instead of at drop. Calling it twice is a no-op.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }

        self.host.dec_active_requests();
        self.finished = true;
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        // Also covers cancelled futures and early returns.
        self.finish();
    }
}
