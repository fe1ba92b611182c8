use api::App;
use core::convert::Infallible;
use db::{Config, Database, NoTls};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{env, net::Ipv4Addr, sync::Arc};
use tokio::{net::TcpListener, runtime::Builder};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let port: u16 = env::var("PORT")?.parse()?;
    let config: Config = env::var("DATABASE_URL")?.parse()?;

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(port, config))
}

async fn run(port: u16, config: Config) -> anyhow::Result<()> {
    let (client, connection) = config.connect(NoTls).await?;
    let driver = tokio::spawn(async move {
        if let Err(err) = connection.await {
            log::error!("database connection closed: {err}");
        }
    });

    let db = Database::from(client);
    db.migrate().await?;
    let app = App::new(Arc::new(db));

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
    log::info!("listening on {}", listener.local_addr()?);

    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);

    loop {
        let (stream, addr) = tokio::select! {
            biased;
            res = &mut stop => {
                res?;
                break;
            }
            res = listener.accept() => res?,
        };

        let app = app.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(app.respond(req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                log::error!("connection with {addr} failed: {err}");
            }
        });
    }

    log::info!("shutting down");
    driver.abort();
    Ok(())
}
