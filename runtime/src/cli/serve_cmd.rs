//! `harvester serve`: run the HTTP control surface.

use crate::acquisition::{RetryPolicy, SitemapFetcher};
use crate::cli::output::{self, Styled};
use crate::job::JobManager;
use crate::server;
use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub async fn run(host: IpAddr, port: u16) -> Result<()> {
    let fetcher = SitemapFetcher::new(RetryPolicy::default())?;
    let manager = Arc::new(JobManager::new(Arc::new(fetcher)));
    let addr = SocketAddr::new(host, port);

    if !output::is_quiet() {
        let s = Styled::new();
        output::print_header(&s);
        output::print_check(s.ok_sym(), "Listening", &format!("http://{addr}"));
        output::print_detail(&s.dim("POST /start, /pause, /resume, /stop  GET /status, /categories"));
        eprintln!();
    }

    server::serve(addr, manager).await
}
