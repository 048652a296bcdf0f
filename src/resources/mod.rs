//! Per-resource facades over [`LarkClient::call`].
//!
//! Each facade borrows a client and maps a handful of logical operations onto
//! one vendor path each. Bodies are passed through and responses are returned
//! verbatim.

pub mod bitable;
pub mod calendar;
pub mod docx;
pub mod im;
pub mod task;
pub mod wiki;

pub use bitable::Bitable;
pub use calendar::Calendar;
pub use docx::Documents;
pub use im::{ChatHistory, DownloadOutcome, MessageWindow, Messages};
pub use task::Tasks;
pub use wiki::Wiki;

use crate::client::LarkClient;

impl LarkClient {
    pub fn docx(&self) -> Documents<'_> {
        Documents::new(self)
    }

    pub fn wiki(&self) -> Wiki<'_> {
        Wiki::new(self)
    }

    pub fn bitable(&self) -> Bitable<'_> {
        Bitable::new(self)
    }

    pub fn im(&self) -> Messages<'_> {
        Messages::new(self)
    }

    pub fn calendar(&self) -> Calendar<'_> {
        Calendar::new(self)
    }

    pub fn task(&self) -> Tasks<'_> {
        Tasks::new(self)
    }
}

/// Common paging parameters.
#[derive(Debug, Default, Clone)]
pub struct Page {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl Page {
    pub fn size(page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            page_token: None,
        }
    }

    pub fn token(mut self, page_token: impl Into<String>) -> Self {
        self.page_token = Some(page_token.into());
        self
    }
}
