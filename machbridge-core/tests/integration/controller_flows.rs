//! Power policy flows driven through the public controller API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use machbridge_core::{
    AutoOffConfig, Container, HostConfig, MachineConfig, MachineController, MonitorConfig,
    PowerConfig,
};

use super::fakes::{FakePinger, ScriptedExecutor};

fn machine_config(power: Option<PowerConfig>) -> MachineConfig {
    MachineConfig {
        id: "basement-server".to_string(),
        enable_containers: true,
        enable_vms: false,
        host: HostConfig {
            monitor: MonitorConfig::PollOverSsh {
                ip: None,
                port: None,
                interval: 5,
            },
            publish: false,
            ip: "10.0.0.5".to_string(),
            mac: None,
            power,
        },
    }
}

fn container_listing(entries: &[(&str, &str)]) -> String {
    let objects: Vec<String> = entries
        .iter()
        .map(|(name, status)| format!(r#"{{"Names": ["{name}"], "Status": "{status}"}}"#))
        .collect();
    format!("[{}]", objects.join(","))
}

/// Executor simulating a host whose container listing the test can edit
fn docker_executor(initial: &str) -> (Arc<ScriptedExecutor>, Arc<Mutex<String>>) {
    let listing = Arc::new(Mutex::new(initial.to_string()));
    let shared = Arc::clone(&listing);
    let executor = Arc::new(ScriptedExecutor::new(move |command| {
        if command.starts_with("docker ps") {
            Ok(shared.lock().unwrap().clone())
        } else {
            Ok(String::new())
        }
    }));
    (executor, listing)
}

async fn wait_for_container(controller: &MachineController, name: &str) -> Arc<Container> {
    loop {
        if let Some(container) = controller.containers().unwrap().get(name) {
            return container;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn auto_on_defers_the_resource_start_until_the_host_answers() {
    let power = PowerConfig {
        auto_on: true,
        auto_off: AutoOffConfig::default(),
        switch_off_mechanism: None,
    };
    let (executor, _) = docker_executor(&container_listing(&[("web", "Exited (0) 2 hours ago")]));
    let pinger = Arc::new(FakePinger::new(false));
    let controller = Arc::new(
        MachineController::with_parts(
            &machine_config(Some(power)),
            executor.clone(),
            pinger.clone(),
        )
        .unwrap(),
    );

    controller.start_monitoring();
    let web = wait_for_container(&controller, "web").await;

    let ctrl = Arc::clone(&controller);
    let container = Arc::clone(&web);
    let start = tokio::spawn(async move { ctrl.start_container(&container).await });

    // As long as the host sleeps, the start command must not go out
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(executor.count_calls("docker start"), 0);
    assert!(!controller.available());

    pinger.set_alive(true);
    start.await.unwrap().unwrap();

    assert!(controller.available());
    assert_eq!(executor.count_calls("docker start web"), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_off_suspends_the_host_only_when_everything_stays_idle() {
    let power = PowerConfig {
        auto_on: false,
        auto_off: AutoOffConfig {
            enabled: true,
            seconds_delay: Some(120),
        },
        switch_off_mechanism: None,
    };
    let (executor, listing) = docker_executor(&container_listing(&[
        ("web", "Up 3 minutes"),
        ("db", "Up 2 hours"),
    ]));
    let pinger = Arc::new(FakePinger::new(true));
    let controller = Arc::new(
        MachineController::with_parts(&machine_config(Some(power)), executor.clone(), pinger)
            .unwrap(),
    );

    controller.start_monitoring();
    let web = wait_for_container(&controller, "web").await;
    let db = wait_for_container(&controller, "db").await;

    // Stopping one of two running containers leaves the host alone
    controller.stop_container(&web).await.unwrap();
    tokio::time::sleep(Duration::from_secs(130)).await;
    assert_eq!(executor.count_calls("pm-suspend"), 0);

    // Once the first stop is observed, stopping the second arms the timer
    *listing.lock().unwrap() = container_listing(&[
        ("web", "Exited (0) 1 second ago"),
        ("db", "Up 2 hours"),
    ]);
    tokio::time::sleep(Duration::from_secs(6)).await;
    controller.stop_container(&db).await.unwrap();

    // A container coming back before the delay elapses cancels it
    *listing.lock().unwrap() = container_listing(&[
        ("web", "Exited (0) 1 minute ago"),
        ("db", "Exited (0) 1 second ago"),
        ("cache", "Up 1 second"),
    ]);
    tokio::time::sleep(Duration::from_secs(130)).await;
    assert_eq!(executor.count_calls("pm-suspend"), 0);

    // The container disappearing re-arms; nothing runs any more, so the
    // delay elapses and the host is switched off exactly once
    *listing.lock().unwrap() = container_listing(&[
        ("web", "Exited (0) 2 minutes ago"),
        ("db", "Exited (0) 1 minute ago"),
    ]);
    tokio::time::sleep(Duration::from_secs(6)).await;
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(executor.count_calls("pm-suspend"), 1);

    // With nothing changing, the timer does not fire again
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(executor.count_calls("pm-suspend"), 1);
}
