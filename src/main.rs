use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{info, initialize_logger, parse_level, warn};
use tokio::sync::mpsc;
use warp::Filter;

use trackmyshow::config::{get_optional_variable, get_variable};
use trackmyshow::environment::Environment;
use trackmyshow::routes::{self, admin::TerminationFunctionWrapper};
use trackmyshow::selector::PgConnector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger(parse_level(
        get_optional_variable("BACKEND_LOG_LEVEL").as_deref(),
    ));

    let main_port: u16 = get_variable("BACKEND_PORT").parse()?;
    let admin_port: u16 = get_variable("BACKEND_ADMIN_PORT").parse()?;

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let connector = PgConnector::from_env();
    if !connector.is_configured() {
        warn!(logger, "BACKEND_DB_CONNECTION_STRING is not set; records will be kept in memory");
    }

    let environment = Environment::with_connector(logger.clone(), Arc::new(connector));

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: TerminationFunctionWrapper = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver is only gone once shutdown has already begun
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();
        let logger2 = logger.clone();

        let routes = routes::make_routes(environment.clone())
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate.clone()),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
