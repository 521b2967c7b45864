//! Command implementations and dispatch.

use std::path::Path;
use std::sync::Arc;

use machbridge_core::{
    CollectionEvent, Config, Container, MachineConfig, MachineController, Vm, wol,
};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::Commands;
use crate::error::CliError;

/// Runs the selected command against the given configuration file
pub async fn dispatch(config_path: &Path, command: Commands) -> Result<(), CliError> {
    let config = Config::load(config_path)?;

    match command {
        Commands::List => list(&config),
        Commands::Wake { machine } => wake(&config, &machine),
        Commands::Suspend { machine } => suspend(&config, &machine).await,
        Commands::Watch { machine } => watch(&config, machine.as_deref()).await,
    }
}

/// Finds a machine entry by its identifier
fn find_machine<'a>(config: &'a Config, id: &str) -> Result<&'a MachineConfig, CliError> {
    config
        .machines
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| CliError::MachineNotFound(id.to_string()))
}

fn list(config: &Config) -> Result<(), CliError> {
    if config.machines.is_empty() {
        println!("No machines configured");
        return Ok(());
    }

    for machine in &config.machines {
        let mut facets = Vec::new();
        if machine.host.publish {
            facets.push("host");
        }
        if machine.enable_containers {
            facets.push("containers");
        }
        if machine.enable_vms {
            facets.push("vms");
        }
        let facets = if facets.is_empty() {
            "none".to_string()
        } else {
            facets.join(", ")
        };

        let power = machine.host.power.as_ref().map_or_else(
            || "manual".to_string(),
            |p| {
                let mut parts = Vec::new();
                if p.auto_on {
                    parts.push("auto-on".to_string());
                }
                if p.auto_off.enabled {
                    parts.push(format!(
                        "auto-off after {}s",
                        p.auto_off.seconds_delay.unwrap_or(0)
                    ));
                }
                if parts.is_empty() {
                    "manual".to_string()
                } else {
                    parts.join(", ")
                }
            },
        );

        println!(
            "{}  host={}  facets=[{}]  power={}",
            machine.id, machine.host.ip, facets, power
        );
    }

    Ok(())
}

fn wake(config: &Config, id: &str) -> Result<(), CliError> {
    let machine = find_machine(config, id)?;
    let Some(mac) = machine.host.mac else {
        return Err(CliError::NoMacConfigured(id.to_string()));
    };

    wol::send_magic_packet(&mac, wol::DEFAULT_BROADCAST_ADDRESS, wol::DEFAULT_WOL_PORT)?;
    println!("Wake packet sent to {mac} for machine {id}");
    Ok(())
}

async fn suspend(config: &Config, id: &str) -> Result<(), CliError> {
    let machine = find_machine(config, id)?;
    let controller = MachineController::new(machine)?;
    controller.stop_host().await?;
    println!("Machine {id} switched off");
    Ok(())
}

async fn watch(config: &Config, only: Option<&str>) -> Result<(), CliError> {
    let mut controllers = Vec::new();
    for machine in &config.machines {
        if only.is_some_and(|id| id != machine.id) {
            continue;
        }
        let controller = Arc::new(MachineController::new(machine)?);
        controller.start_monitoring();
        spawn_printers(&controller);
        controllers.push(controller);
    }

    if controllers.is_empty() {
        return Err(CliError::MachineNotFound(
            only.unwrap_or("<none configured>").to_string(),
        ));
    }

    println!(
        "Watching {} machine(s), press Ctrl-C to stop",
        controllers.len()
    );
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Prints availability and resource changes of one machine
fn spawn_printers(controller: &Arc<MachineController>) {
    let name = controller.name().to_string();
    let mut availability = controller.subscribe_availability();
    tokio::spawn(async move {
        while availability.changed().await.is_ok() {
            let up = *availability.borrow_and_update();
            println!(
                "[{name}] host {}",
                if up { "reachable" } else { "unreachable" }
            );
        }
    });

    if let Some(containers) = controller.containers() {
        let name = controller.name().to_string();
        let mut events = containers.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CollectionEvent::Added(container)) => {
                        println!(
                            "[{name}] container {} appeared ({})",
                            container.name(),
                            container.status()
                        );
                        print_container_updates(name.clone(), &container);
                    }
                    Ok(CollectionEvent::Removed(container)) => {
                        println!("[{name}] container {} disappeared", container.name());
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    if let Some(vms) = controller.vms() {
        let name = controller.name().to_string();
        let mut events = vms.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CollectionEvent::Added(vm)) => {
                        println!("[{name}] vm {} appeared ({})", vm.name(), vm.state());
                        print_vm_updates(name.clone(), &vm);
                    }
                    Ok(CollectionEvent::Removed(vm)) => {
                        println!("[{name}] vm {} disappeared", vm.name());
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Follows one container's status until the record is dropped
fn print_container_updates(machine: String, container: &Arc<Container>) {
    let container_name = container.name().to_string();
    let mut status = container.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            println!("[{machine}] container {container_name}: {current}");
        }
    });
}

/// Follows one domain's state until the record is dropped
fn print_vm_updates(machine: String, vm: &Arc<Vm>) {
    let vm_name = vm.name().to_string();
    let mut state = vm.watch_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = state.borrow_and_update().clone();
            println!("[{machine}] vm {vm_name}: {current}");
        }
    });
}
