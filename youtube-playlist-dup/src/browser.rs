//! Getting the user to a URL.

/// Why a URL could not be opened automatically.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no supported browser on this platform")]
    Unsupported,
    #[error("failed to launch browser")]
    LaunchFailed(#[source] std::io::Error),
}

/// Something that can show a URL to the user.
///
/// Failing to open is never fatal for callers; they fall back to printing the URL.
pub trait Browser {
    fn open(&self, url: &str) -> Result<(), BrowserError>;
}

/// Opens URLs in the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), BrowserError> {
        if !webbrowser::Browser::Default.exists() {
            return Err(BrowserError::Unsupported);
        }
        webbrowser::open(url).map_err(BrowserError::LaunchFailed)
    }
}
