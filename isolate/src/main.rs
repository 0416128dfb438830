use clap::Parser as ClapParser;
use std::{
    process,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use isolate::{
    DEFAULT_UNHANDLED_EXCEPTION_HANDLER, Failure, HANDLE_MESSAGE, ILLEGAL_PORT,
    Isolate, IsolateCreateInfo, IsolateFlags, Library, PortId, Priority,
    SpawnedIsolate, Value, spawn_isolate,
};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of worker isolates
    #[arg(long, default_value_t = 2)]
    isolates: usize,

    /// Messages sent to each worker
    #[arg(long, default_value_t = 100)]
    messages: i64,

    #[arg(long, help = "Log isolate startup and shutdown")]
    trace_isolates: bool,

    #[arg(long, help = "Dump invoked functions at shutdown")]
    report_usage_count: bool,

    /// Workers throw on every Nth message and continue from the exception
    #[arg(long, default_value_t = 0)]
    fail_every: i64,
}

fn flags(cli: &Cli) -> IsolateFlags {
    IsolateFlags {
        trace_isolates: cli.trace_isolates,
        report_usage_count: cli.report_usage_count,
        ..Default::default()
    }
}

/// Worker program: doubles every number back to the sender. 0 stops it.
fn worker_library(fail_every: i64) -> Library {
    let mut lib = Library::new("demo:worker");
    lib.add_function(HANDLE_MESSAGE, move |isolate, args| {
        let n = args[2].as_smi().unwrap_or_default();
        if n == 0 {
            let main = isolate.main_port();
            isolate.close_port(main);
            return Ok(Value::Null);
        }
        if fail_every > 0 && n % fail_every == 0 {
            return Err(Failure::UnhandledException {
                exception: Value::Smi(n),
                stacktrace: Value::Null,
            });
        }
        let reply = PortId(args[1].as_smi().unwrap_or_default());
        isolate
            .send(reply, ILLEGAL_PORT, Value::Smi(n * 2), Priority::Normal)
            .map_err(|err| Failure::Api(err.to_string()))?;
        Ok(Value::Null)
    });
    lib.add_function(DEFAULT_UNHANDLED_EXCEPTION_HANDLER, |isolate, _| {
        log::warn!("{}: continuing after exception", isolate.name());
        Ok(Value::Bool(true))
    });
    lib
}

fn spawn_workers(cli: &Cli) -> Vec<SpawnedIsolate> {
    (0..cli.isolates)
        .map(|_| {
            let fail_every = cli.fail_every;
            let info = IsolateCreateInfo {
                name_prefix: Some("worker".into()),
                flags: flags(cli),
                ..Default::default()
            };
            spawn_isolate(info, move |isolate| {
                let store = isolate.object_store_mut();
                let id = store.add_library(worker_library(fail_every));
                store.set_isolate_library(id);
                isolate.set_main_port_live();
            })
            .unwrap_or_else(|err| {
                eprintln!("Error spawning worker: {err}");
                process::exit(1);
            })
        })
        .collect()
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let failures_per_worker = if cli.fail_every > 0 {
        cli.messages / cli.fail_every
    } else {
        0
    };
    let expected = (cli.messages - failures_per_worker) * cli.isolates as i64;

    let workers = spawn_workers(&cli);

    let mut main = Isolate::new(IsolateCreateInfo {
        name_prefix: Some("main".into()),
        flags: flags(&cli),
        ..Default::default()
    });
    let received = Arc::new(AtomicI64::new(0));
    let sum = Arc::new(AtomicI64::new(0));
    {
        let (received, sum) = (received.clone(), sum.clone());
        let mut lib = Library::new("demo:main");
        lib.add_function(HANDLE_MESSAGE, move |isolate, args| {
            sum.fetch_add(args[2].as_smi().unwrap_or_default(), Ordering::Relaxed);
            if received.fetch_add(1, Ordering::Relaxed) + 1 == expected {
                let port = isolate.main_port();
                isolate.close_port(port);
            }
            Ok(Value::Null)
        });
        let store = main.object_store_mut();
        let id = store.add_library(lib);
        store.set_isolate_library(id);
    }
    main.set_main_port_live();

    for worker in &workers {
        for n in 1..=cli.messages {
            if let Err(err) = main.send(
                worker.main_port(),
                main.main_port(),
                Value::Smi(n),
                Priority::Normal,
            ) {
                eprintln!("Error sending to {}: {err}", worker.name());
                process::exit(1);
            }
        }
    }

    if expected > 0 && !main.run() {
        if let Some(error) = main.sticky_error() {
            eprintln!("Error in {}: {error}", main.name());
        }
    }

    for worker in workers {
        let _ = main.send(worker.main_port(), ILLEGAL_PORT, Value::Smi(0), Priority::Normal);
        let name = worker.name().to_owned();
        match worker.join() {
            Ok(None) => {}
            Ok(Some(error)) => eprintln!("{name} stopped with: {error}"),
            Err(_) => eprintln!("{name} panicked"),
        }
    }

    println!(
        "{} replies from {} isolates, sum {}",
        received.load(Ordering::Relaxed),
        cli.isolates,
        sum.load(Ordering::Relaxed)
    );
    main.shutdown();
}
