use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::*;
use crate::helpers::ControlWriter;
use crate::server::ServerState;
use crate::session::Session;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

// Specific crates for PORT and PASV commands
use crate::core_network::pasv;
use crate::core_network::port;

type CommandHandler = Box<
    dyn Fn(
            ControlWriter,
            Arc<ServerState>,
            Arc<TokioMutex<Session>>,
            String, // Everything after the verb
        ) -> Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send>>
        + Send
        + Sync,
>;

pub type CommandHandlers = HashMap<FtpCommand, Arc<CommandHandler>>;

fn insert<F, Fut>(handlers: &mut CommandHandlers, command: FtpCommand, handler: F)
where
    F: Fn(ControlWriter, Arc<ServerState>, Arc<TokioMutex<Session>>, String) -> Fut
        + Send
        + Sync
        + 'static,
    Fut: Future<Output = Result<(), std::io::Error>> + Send + 'static,
{
    handlers.insert(
        command,
        Arc::new(Box::new(move |writer, state, session, arg| {
            Box::pin(handler(writer, state, session, arg))
        })),
    );
}

pub fn initialize_command_handlers() -> CommandHandlers {
    let mut handlers: CommandHandlers = HashMap::new();

    insert(&mut handlers, FtpCommand::USER, user::handle_user_command);
    insert(&mut handlers, FtpCommand::PASS, pass::handle_pass_command);
    insert(&mut handlers, FtpCommand::QUIT, quit::handle_quit_command);
    insert(&mut handlers, FtpCommand::NOOP, noop::handle_noop_command);
    insert(&mut handlers, FtpCommand::ALLO, allo::handle_allo_command);
    insert(&mut handlers, FtpCommand::SYST, syst::handle_syst_command);
    insert(&mut handlers, FtpCommand::HELP, help::handle_help_command);
    insert(&mut handlers, FtpCommand::CLNT, clnt::handle_clnt_command);
    insert(&mut handlers, FtpCommand::SITE, site::handle_site_command);
    insert(&mut handlers, FtpCommand::FEAT, feat::handle_feat_command);
    insert(&mut handlers, FtpCommand::OPTS, opts::handle_opts_command);
    insert(&mut handlers, FtpCommand::TYPE, type_::handle_type_command);
    insert(&mut handlers, FtpCommand::MODE, mode::handle_mode_command);
    insert(&mut handlers, FtpCommand::STRU, stru::handle_stru_command);
    insert(&mut handlers, FtpCommand::CWD, cwd::handle_cwd_command);
    insert(&mut handlers, FtpCommand::PWD, pwd::handle_pwd_command);
    insert(&mut handlers, FtpCommand::CDUP, cdup::handle_cdup_command);
    insert(&mut handlers, FtpCommand::REST, rest::handle_rest_command);
    insert(&mut handlers, FtpCommand::PASV, pasv::handle_pasv_command);
    insert(&mut handlers, FtpCommand::PORT, port::handle_port_command);
    insert(&mut handlers, FtpCommand::RETR, retr::handle_retr_command);
    insert(&mut handlers, FtpCommand::STOR, stor::handle_stor_command);
    insert(&mut handlers, FtpCommand::APPE, stor::handle_appe_command);
    insert(&mut handlers, FtpCommand::STOU, stor::handle_stou_command);
    insert(&mut handlers, FtpCommand::DELE, dele::handle_dele_command);
    insert(&mut handlers, FtpCommand::SIZE, size::handle_size_command);
    insert(&mut handlers, FtpCommand::MDTM, mdtm::handle_mdtm_command);
    insert(&mut handlers, FtpCommand::LIST, list::handle_list_command);
    insert(&mut handlers, FtpCommand::NLST, list::handle_nlst_command);
    insert(&mut handlers, FtpCommand::STAT, list::handle_stat_command);
    insert(&mut handlers, FtpCommand::ABOR, abor::handle_abor_command);

    // Directories are labels only
    for command in [
        FtpCommand::MKD,
        FtpCommand::RMD,
        FtpCommand::RNFR,
        FtpCommand::RNTO,
    ] {
        insert(&mut handlers, command, unimplemented::handle_unimplemented_command);
    }

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_a_handler() {
        let handlers = initialize_command_handlers();
        for verb in [
            "USER", "PASS", "QUIT", "NOOP", "ALLO", "SYST", "HELP", "CLNT", "SITE", "FEAT",
            "OPTS", "TYPE", "MODE", "STRU", "CWD", "XCWD", "PWD", "XPWD", "CDUP", "XCUP",
            "REST", "PASV", "PORT", "RETR", "STOR", "APPE", "STOU", "DELE", "SIZE", "MDTM",
            "LIST", "NLST", "STAT", "ABOR", "MKD", "XMKD", "RMD", "XRMD", "RNFR", "RNTO",
        ] {
            let command = FtpCommand::from_str(verb).unwrap();
            assert!(handlers.contains_key(&command), "{} has no handler", verb);
        }
    }
}
