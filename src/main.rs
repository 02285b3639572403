use clap::Parser;
use std::io;

use statik::args::Args;
use statik::logging::setup_logging;
use statik::Server;

fn main() -> io::Result<()> {
    let args = Args::parse();
    setup_logging();

    let config = args.into_config()?;
    let (port, address) = (config.port, config.address.clone());

    let mut server = Server::new(config)?;
    let local_addr = server.listen(port, &address)?;
    println!("Listening on: http://{}", local_addr);
    println!("Serving directory: {}", server.config().document_root.display());

    server.wait();
    Ok(())
}
