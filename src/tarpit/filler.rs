use crate::ContentType;
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::prelude::*;

const PAGE_HEAD: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><html><head><title>This is a TL;DR page.</title></head><body>";
const PAGE_LINE: &str = "What you are looking for is in the next line<br>";

/// Produces the chunks fed to trapped clients.
#[derive(Debug, Clone)]
pub enum Filler {
    /// Static page, built once and shared between every chunk.
    Page(Bytes),
    /// Fresh random alphanumerics for every chunk.
    Random { size: usize },
}

impl Filler {
    pub fn new(content_type: &ContentType, lines: usize) -> Self {
        let page = Self::page(lines);
        if content_type.is_html() {
            Self::Page(page)
        } else {
            Self::Random { size: page.len() }
        }
    }

    fn page(lines: usize) -> Bytes {
        let mut page = String::with_capacity(PAGE_HEAD.len() + PAGE_LINE.len() * lines);
        page.push_str(PAGE_HEAD);
        for _ in 0..lines {
            page.push_str(PAGE_LINE);
        }
        Bytes::from(page)
    }

    pub fn chunk(&self) -> Bytes {
        match self {
            Self::Page(page) => page.clone(),
            Self::Random { size } => rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(*size)
                .collect::<Vec<u8>>()
                .into(),
        }
    }

    pub fn chunk_len(&self) -> usize {
        match self {
            Self::Page(page) => page.len(),
            Self::Random { size } => *size,
        }
    }
}
