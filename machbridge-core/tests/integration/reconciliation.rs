//! Poll reconciliation across both resource types through a controller

use std::sync::{Arc, Mutex};
use std::time::Duration;

use machbridge_core::{
    CommandError, Container, HostConfig, MachineConfig, MachineController, MonitorConfig, Vm,
};

use super::fakes::{FakePinger, ScriptedExecutor};

fn machine_config() -> MachineConfig {
    MachineConfig {
        id: "lab-host".to_string(),
        enable_containers: true,
        enable_vms: true,
        host: HostConfig {
            monitor: MonitorConfig::PollOverSsh {
                ip: None,
                port: None,
                interval: 5,
            },
            publish: false,
            ip: "10.0.0.7".to_string(),
            mac: None,
            power: None,
        },
    }
}

/// Remote side with editable listings and a breakable command channel
struct FakeRemote {
    containers: Mutex<String>,
    vms: Mutex<String>,
    broken: Mutex<bool>,
}

impl FakeRemote {
    fn new(containers: &str, vms: &str) -> Arc<Self> {
        Arc::new(Self {
            containers: Mutex::new(containers.to_string()),
            vms: Mutex::new(vms.to_string()),
            broken: Mutex::new(false),
        })
    }

    fn executor(self: &Arc<Self>) -> Arc<ScriptedExecutor> {
        let remote = Arc::clone(self);
        Arc::new(ScriptedExecutor::new(move |command| {
            if *remote.broken.lock().unwrap() {
                return Err(CommandError::Failed {
                    status: "exit status: 255".to_string(),
                    stderr: "machine is rebooting".to_string(),
                });
            }
            if command.starts_with("docker ps") {
                Ok(remote.containers.lock().unwrap().clone())
            } else if command.starts_with("virsh list") {
                Ok(remote.vms.lock().unwrap().clone())
            } else {
                Ok(String::new())
            }
        }))
    }
}

async fn wait_for_container(controller: &MachineController, name: &str) -> Arc<Container> {
    loop {
        if let Some(container) = controller.containers().unwrap().get(name) {
            return container;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_vm(controller: &MachineController, name: &str) -> Arc<Vm> {
    loop {
        if let Some(vm) = controller.vms().unwrap().get(name) {
            return vm;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn polling_mirrors_remote_state_and_survives_outages() {
    let remote = FakeRemote::new(
        r#"[{"Names": ["web"], "Status": "Up 3 minutes"},
            {"Names": ["db"], "Status": "Up 2 hours"}]"#,
        r#"[{"Name": "build-server", "State": "running"}]"#,
    );
    let pinger = Arc::new(FakePinger::new(true));
    let controller = Arc::new(
        MachineController::with_parts(&machine_config(), remote.executor(), pinger).unwrap(),
    );

    controller.start_monitoring();
    let web = wait_for_container(&controller, "web").await;
    let db = wait_for_container(&controller, "db").await;
    let build = wait_for_vm(&controller, "build-server").await;
    let mut build_state = build.watch_state();

    assert!(web.is_running());
    assert!(db.is_running());
    assert!(build.is_running());

    // Second snapshot: web is gone, db has exited, cache appeared, the
    // domain was paused
    *remote.containers.lock().unwrap() = r#"[
        {"Names": ["db"], "Status": "Exited (0) 1 second ago"},
        {"Names": ["cache"], "Status": "Up 1 second"}]"#
        .to_string();
    *remote.vms.lock().unwrap() =
        r#"[{"Name": "build-server", "State": "paused"}]"#.to_string();
    tokio::time::sleep(Duration::from_secs(6)).await;

    // Membership is exactly the second snapshot
    let containers = controller.containers().unwrap();
    assert_eq!(containers.len(), 2);
    assert!(containers.get("web").is_none());
    assert!(containers.get("cache").is_some());

    // Surviving records kept their identity and took the new state in place
    let db_after = containers.get("db").unwrap();
    assert!(Arc::ptr_eq(&db, &db_after));
    assert!(!db_after.is_running());

    let build_after = controller.vms().unwrap().get("build-server").unwrap();
    assert!(Arc::ptr_eq(&build, &build_after));
    assert_eq!(build_after.state(), "paused");
    assert!(build_state.has_changed().unwrap());
    assert_eq!(*build_state.borrow_and_update(), "paused");

    // A broken command channel leaves the mirrored state untouched
    *remote.broken.lock().unwrap() = true;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let containers = controller.containers().unwrap();
    assert_eq!(containers.len(), 2);
    assert!(Arc::ptr_eq(&db_after, &containers.get("db").unwrap()));
    assert_eq!(db_after.status(), "Exited (0) 1 second ago");
    assert_eq!(controller.vms().unwrap().len(), 1);
    assert_eq!(build_after.state(), "paused");
}
