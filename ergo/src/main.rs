mod command;
mod constants;
mod store;
mod terminal;
mod utils;

use anyhow::Error;
use command::Command;

fn main() -> Result<(), Error> {
    use structopt::StructOpt;
    Command::from_args().run()
}
