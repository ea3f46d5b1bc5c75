//! Command dispatch.

pub mod config_cmd;
pub mod machines;
pub mod routes;
pub mod session;

use crate::cli::{Cli, Command, CompletionsArgs, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Session(args) => session::handle(args, global).await,
        Command::Machines(args) => machines::handle(args, global).await,
        Command::Routes(args) => routes::handle(args, global).await,
        // Config and completions never contact the backend.
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            completions(&args);
            Ok(())
        }
    }
}

fn completions(args: &CompletionsArgs) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "machdesk", &mut std::io::stdout());
}
