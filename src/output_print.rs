use crate::checker::CheckResult;
use crate::output::Outputs;

pub struct PrintOutput {}

impl PrintOutput {
    pub fn new() -> Self {
        return Self{}
    }
}

fn format_result(result: &CheckResult) -> String {
    let mut labels: Vec<String> = result.labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    labels.sort();
    let outcome = match &result.verdict {
        Ok(verdict) => verdict.to_string(),
        Err(e) => format!("ERROR: {}", e)
    };
    format!("{} {} [{}] {}", result.name, result.check, labels.join(","), outcome)
}

impl Outputs for PrintOutput {
    fn process_result(&mut self, result: CheckResult) {
        println!("{}", format_result(&result));
    }
}
