use log::debug;

use crate::error::Result;

pub trait ResultExtensions<T> {
    /// Prints the error for the user and carries on without a value.
    fn report(self) -> Option<T>;
}

impl<T> ResultExtensions<T> for Result<T> {
    fn report(self) -> Option<T> {
        self.inspect_err(|err| {
            debug!("{:?}", err);
            eprintln!("{}", err);
        })
        .ok()
    }
}
