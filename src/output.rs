use std::sync::mpsc::Receiver;
use log::debug;
use crate::checker::CheckResult;

pub trait Outputs {
    fn process_result(&mut self, result: CheckResult);
}

/// Feeds every result to `output` until all senders are gone.
pub fn output_worker<T: Outputs>(mut output: T, receiver: Receiver<CheckResult>) {
    for result in receiver {
        output.process_result(result);
    }
    debug!("Output channel closed");
}
