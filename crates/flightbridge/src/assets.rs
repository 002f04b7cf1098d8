//! Page fragments and assembly.
//!
//! The visualization pages are concatenations of pre-built fragments
//! (header, stylesheet, scripts, body) produced by the separate asset
//! packaging step and dropped as `<stem>.html` files under the asset root.
//! This module is the boundary to that collaborator: it knows the fragment
//! order for each page and rewrites the device streaming address embedded in
//! the fragments to point at this relay.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

/// Pattern matching the device WebSocket address baked into the fragments.
const DEVICE_STREAM_ADDR: &str = r"ws://192\.168\.[0-9]+\.[0-9]+:81";

/// Which page a request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Live telemetry view (`/` and `/live`).
    Live,
    /// Calibration wizard (`/calwiz`).
    Calibration,
    /// Control panel (`/control`, interactive mode).
    Control,
}

impl PageKind {
    /// Fragment stems in their fixed concatenation order.
    #[must_use]
    pub fn fragments(self) -> &'static [&'static str] {
        match self {
            Self::Live => &["html_header", "css_chartist", "html_liveview"],
            Self::Calibration => &[
                "html_header",
                "css_chartist",
                "javascript_chartist1",
                "javascript_chartist2",
                "javascript_regression",
                "sg_filter",
                "javascript_calibration",
                "html_calibration",
            ],
            Self::Control => &["html_control"],
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Calibration => write!(f, "calibration"),
            Self::Control => write!(f, "control"),
        }
    }
}

/// Fragment store over the asset root directory.
#[derive(Debug)]
pub struct PageAssets {
    root: PathBuf,
    device_addr: Regex,
}

impl PageAssets {
    /// Open the fragment store, failing fast if the root is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetRootMissing`] when the directory does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::AssetRootMissing { path: root });
        }
        let device_addr = Regex::new(DEVICE_STREAM_ADDR)
            .map_err(|error| Error::internal(format!("bad address pattern: {error}")))?;
        Ok(Self { root, device_addr })
    }

    /// The asset root this store reads from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read one fragment by stem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FragmentMissing`] when the fragment file cannot be
    /// read.
    pub fn fragment(&self, stem: &str) -> Result<String> {
        let path = self.root.join(format!("{stem}.html"));
        std::fs::read_to_string(&path).map_err(|_| Error::FragmentMissing { path })
    }

    /// Assemble a full page: concatenate its fragments in order and point
    /// every embedded streaming address at `localhost:<stream_port>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FragmentMissing`] for the first unreadable fragment.
    pub fn page(&self, kind: PageKind, stream_port: u16) -> Result<String> {
        let mut html = String::new();
        for stem in kind.fragments() {
            html.push_str(&self.fragment(stem)?);
        }
        Ok(self.rewrite_stream_address(&html, stream_port))
    }

    fn rewrite_stream_address(&self, html: &str, stream_port: u16) -> String {
        self.device_addr
            .replace_all(html, format!("ws://localhost:{stream_port}"))
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(fragments: &[(&str, &str)]) -> (tempfile::TempDir, PageAssets) {
        let dir = tempfile::tempdir().unwrap();
        for (stem, content) in fragments {
            std::fs::write(dir.path().join(format!("{stem}.html")), content).unwrap();
        }
        let assets = PageAssets::new(dir.path()).unwrap();
        (dir, assets)
    }

    #[test]
    fn test_missing_root_is_fatal() {
        assert!(matches!(
            PageAssets::new("/nonexistent/web"),
            Err(Error::AssetRootMissing { .. })
        ));
    }

    #[test]
    fn test_live_page_concatenates_in_order() {
        let (_dir, assets) = store_with(&[
            ("html_header", "<head>"),
            ("css_chartist", "<style>"),
            ("html_liveview", "<body>"),
        ]);
        let html = assets.page(PageKind::Live, 8081).unwrap();
        assert_eq!(html, "<head><style><body>");
    }

    #[test]
    fn test_calibration_fragment_order() {
        let order = PageKind::Calibration.fragments();
        assert_eq!(order[0], "html_header");
        assert_eq!(order[1], "css_chartist");
        assert_eq!(*order.last().unwrap(), "html_calibration");
        assert_eq!(order.len(), 8);
    }

    #[test]
    fn test_missing_fragment_reports_path() {
        let (_dir, assets) = store_with(&[("html_header", "<head>")]);
        let err = assets.page(PageKind::Live, 8081).unwrap_err();
        match err {
            Error::FragmentMissing { path } => {
                assert!(path.to_string_lossy().ends_with("css_chartist.html"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stream_address_is_rewritten() {
        let (_dir, assets) = store_with(&[
            ("html_header", "<script>var ws = 'ws://192.168.0.1:81';"),
            ("css_chartist", ""),
            ("html_liveview", "reconnect('ws://192.168.45.22:81')"),
        ]);
        let html = assets.page(PageKind::Live, 9091).unwrap();
        assert!(!html.contains("192.168"));
        assert_eq!(html.matches("ws://localhost:9091").count(), 2);
    }

    #[test]
    fn test_unrelated_addresses_untouched() {
        let (_dir, assets) = store_with(&[("html_control", "fetch('http://192.168.0.1/api')")]);
        let html = assets.page(PageKind::Control, 8081).unwrap();
        assert!(html.contains("http://192.168.0.1/api"));
    }

    #[test]
    fn test_page_kind_display() {
        assert_eq!(PageKind::Live.to_string(), "live");
        assert_eq!(PageKind::Calibration.to_string(), "calibration");
        assert_eq!(PageKind::Control.to_string(), "control");
    }
}
