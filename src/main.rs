use log::{info, debug, error};
use virtmonitor::checker::CheckResult;
use virtmonitor::config::{load_config, parse_args, HostConfig};
use virtmonitor::job::Job;
use virtmonitor::output::output_worker;
use virtmonitor::output_print::PrintOutput;
use virtmonitor::plugin::Plugin;

use std::process;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

fn watch(host: HostConfig, job: Job, sender: Sender<CheckResult>, once: bool) -> bool {
    let interval = Duration::from_secs(host.interval);
    loop {
        let verdict = job.run(host.check).map_err(|e| e.to_string());
        let healthy = matches!(verdict, Ok(ref v) if v.is_finished());
        let result = CheckResult{
            name: host.name.clone(),
            check: host.check.to_string(),
            verdict: verdict,
            labels: host.labels.clone()};
        if sender.send(result).is_err() {
            error!("Output worker is gone, stopping {}", host.name);
            return false;
        }
        if once {
            return healthy;
        }
        thread::sleep(interval);
    }
}

fn main() {
    env_logger::init();
    let cmd_opts = parse_args();
    let cfg = match load_config(&cmd_opts.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("Failed to load config: {}", err);
            process::exit(1);
        }
    };
    let plugin = Plugin::new(cfg.options, cfg.params);
    debug!("Importer timeout: {:?}", plugin.params().importer_tcp_timeout);

    let (output_tx, output_rx) = mpsc::channel();
    info!("Starting print output");
    let output = thread::spawn(move || { output_worker(PrintOutput::new(), output_rx) });

    let mut handles = Vec::<thread::JoinHandle<bool>>::new();
    info!("Starting checks");
    for host in cfg.hosts {
        info!("  Starting {} for {}", host.check, host.name);
        let job = plugin.create_new_job(host.target.clone());
        debug!("{:?} {:?} {:?}", job.target(), &host.check, &host.interval);
        let sender_tx = output_tx.clone();
        let once = cmd_opts.once;
        handles.push(thread::spawn(move || { watch(host, job, sender_tx, once) }));
    }
    drop(output_tx);

    let mut healthy = true;
    for handle in handles {
        healthy &= handle.join().unwrap_or(false);
    }
    if output.join().is_err() {
        error!("Output worker panicked");
        healthy = false;
    }
    if !healthy {
        process::exit(1);
    }
}
