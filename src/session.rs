use crate::core_network::{DataChannel, DataChannelError, DataMode};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
    Ebcdic,
}

impl TransferType {
    /// Maps the first TYPE parameter to a representation.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "A" => Some(TransferType::Ascii),
            "I" => Some(TransferType::Binary),
            "E" => Some(TransferType::Ebcdic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    Listing,
    Uploading,
    Downloading,
    Disconnected,
}

/// Flags given to LIST, NLST and STAT (`-a -d -F -l`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include empty objects.
    pub all: bool,
    /// Describe the working directory itself instead of its content.
    pub directory: bool,
    /// Append a type indicator to names.
    pub classify: bool,
    /// Long listing format, also for NLST.
    pub long: bool,
}

impl ListOptions {
    /// Splits the option words off a listing argument.
    pub fn parse(arg: &str) -> Self {
        let mut options = Self::default();
        for word in arg.split_whitespace().filter(|w| w.starts_with('-')) {
            for flag in word.chars().skip(1) {
                match flag {
                    'a' => options.all = true,
                    'd' => options.directory = true,
                    'F' => options.classify = true,
                    'l' => options.long = true,
                    _ => {}
                }
            }
        }
        options
    }
}

/// Protocol state of one control connection.
pub struct Session {
    pub id: String,
    pub logged_in: bool,
    pub client_id: Option<String>,
    pub working_dir: String,
    pub transfer_type: TransferType,
    pub transfer_mode: TransferMode,
    pub status: SessionStatus,
    pub restart_offset: u64,
    pub list_options: ListOptions,
    pub data: DataChannel,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            logged_in: false,
            client_id: None,
            working_dir: String::from("/"),
            transfer_type: TransferType::Ascii,
            transfer_mode: TransferMode::Stream,
            status: SessionStatus::Waiting,
            restart_offset: 0,
            list_options: ListOptions::default(),
            data: DataChannel::default(),
        }
    }

    /// Returns the pending REST offset and clears it.
    pub fn take_restart_offset(&mut self) -> u64 {
        std::mem::take(&mut self.restart_offset)
    }

    /// True while an upload, download or listing is in progress.
    pub fn is_transferring(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Listing | SessionStatus::Uploading | SessionStatus::Downloading
        )
    }

    pub fn is_disconnected(&self) -> bool {
        self.status == SessionStatus::Disconnected
    }

    /// Brings the negotiated data connection up for a transfer.
    pub async fn open_data_connection(&mut self, timeout: Duration) -> Result<(), DataChannelError> {
        if self.status != SessionStatus::Waiting {
            return Err(DataChannelError::AlreadyConnected);
        }
        if self.data.mode() == DataMode::None {
            return Err(DataChannelError::BadSequence);
        }
        if let Err(e) = self.data.open(timeout).await {
            self.close_data_connection();
            return Err(e);
        }
        Ok(())
    }

    /// Drops the data connection and returns to the waiting state.
    pub fn close_data_connection(&mut self) {
        self.data.close();
        if self.status != SessionStatus::Disconnected {
            self.status = SessionStatus::Waiting;
        }
    }
}
