#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    QUIT,
    NOOP,
    ALLO,
    SYST,
    HELP,
    CLNT,
    SITE,
    FEAT,
    OPTS,
    TYPE,
    MODE,
    STRU,
    CWD,
    PWD,
    CDUP,
    REST,
    PASV,
    PORT,
    RETR,
    STOR,
    APPE,
    STOU,
    DELE,
    SIZE,
    MDTM,
    LIST,
    NLST,
    STAT,
    ABOR,
    MKD,
    RMD,
    RNFR,
    RNTO,
}

impl FtpCommand {
    /// Maps a verb to its command. `X`-prefixed aliases share their handler.
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "NOOP" => Some(FtpCommand::NOOP),
            "ALLO" => Some(FtpCommand::ALLO),
            "SYST" => Some(FtpCommand::SYST),
            "HELP" => Some(FtpCommand::HELP),
            "CLNT" => Some(FtpCommand::CLNT),
            "SITE" => Some(FtpCommand::SITE),
            "FEAT" => Some(FtpCommand::FEAT),
            "OPTS" => Some(FtpCommand::OPTS),
            "TYPE" => Some(FtpCommand::TYPE),
            "MODE" => Some(FtpCommand::MODE),
            "STRU" => Some(FtpCommand::STRU),
            "CWD" | "XCWD" => Some(FtpCommand::CWD),
            "PWD" | "XPWD" => Some(FtpCommand::PWD),
            "CDUP" | "XCUP" => Some(FtpCommand::CDUP),
            "REST" => Some(FtpCommand::REST),
            "PASV" => Some(FtpCommand::PASV),
            "PORT" => Some(FtpCommand::PORT),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "APPE" => Some(FtpCommand::APPE),
            "STOU" => Some(FtpCommand::STOU),
            "DELE" => Some(FtpCommand::DELE),
            "SIZE" => Some(FtpCommand::SIZE),
            "MDTM" => Some(FtpCommand::MDTM),
            "LIST" => Some(FtpCommand::LIST),
            "NLST" => Some(FtpCommand::NLST),
            "STAT" => Some(FtpCommand::STAT),
            "ABOR" => Some(FtpCommand::ABOR),
            "MKD" | "XMKD" => Some(FtpCommand::MKD),
            "RMD" | "XRMD" => Some(FtpCommand::RMD),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            _ => None,
        }
    }

    /// Commands a client may send before USER.
    pub fn requires_login(self) -> bool {
        !matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::QUIT
                | FtpCommand::NOOP
                | FtpCommand::ALLO
                | FtpCommand::SYST
                | FtpCommand::HELP
                | FtpCommand::CLNT
                | FtpCommand::SITE
                | FtpCommand::FEAT
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_a_command() {
        assert_eq!(FtpCommand::from_str("xcwd"), Some(FtpCommand::CWD));
        assert_eq!(FtpCommand::from_str("XPWD"), Some(FtpCommand::PWD));
        assert_eq!(FtpCommand::from_str("XCUP"), Some(FtpCommand::CDUP));
        assert_eq!(FtpCommand::from_str("XMKD"), Some(FtpCommand::MKD));
        assert_eq!(FtpCommand::from_str("XRMD"), Some(FtpCommand::RMD));
        assert_eq!(FtpCommand::from_str("EPSV"), None);
    }

    #[test]
    fn test_login_free_commands() {
        assert!(!FtpCommand::USER.requires_login());
        assert!(!FtpCommand::QUIT.requires_login());
        assert!(!FtpCommand::FEAT.requires_login());
        assert!(FtpCommand::RETR.requires_login());
        assert!(FtpCommand::PASV.requires_login());
        assert!(FtpCommand::OPTS.requires_login());
    }
}
