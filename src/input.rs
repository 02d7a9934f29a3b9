//! Address list input for batch lookups
//!
//! [`open`] returns a buffered reader for a path, `-` meaning stdin. Gzip
//! input is recognized by its magic bytes rather than the file name, so
//! `addrs.txt.gz`, `addrs.gz.1` and a gzip stream piped into stdin all work.
//!
//! [`Addresses`] turns such a reader into a stream of parsed addresses. One
//! address per line; surrounding whitespace, blank lines and `#` comments are
//! ignored. A line may carry trailing columns (`8.8.8.8,google`): only the
//! text before the first comma, tab or space is parsed.
//!
//! ```rust,no_run
//! use ip2geo::input;
//!
//! for item in input::addresses(input::open("ips.txt.gz")?) {
//!     let line = item?;
//!     match line.addr {
//!         Some(addr) => println!("{}: {}", line.number, addr),
//!         None => eprintln!("line {}: not an address: {}", line.number, line.text),
//!     }
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::net::IpAddr;
use std::path::Path;

const BUFFER_SIZE: usize = 128 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open `path` for reading, transparently decompressing gzip
///
/// `-` reads stdin.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    if path.to_str() == Some("-") {
        return from_reader(io::stdin());
    }
    from_reader(File::open(path)?)
}

/// Wrap any reader, sniffing the first bytes for the gzip magic
pub fn from_reader<R: Read + Send + 'static>(reader: R) -> io::Result<Box<dyn BufRead + Send>> {
    let mut buffered = BufReader::with_capacity(BUFFER_SIZE, reader);
    let gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
    if gzip {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            MultiGzDecoder::new(buffered),
        )))
    } else {
        Ok(Box::new(buffered))
    }
}

/// One non-blank, non-comment input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressLine {
    /// 1-based line number in the input
    pub number: usize,
    /// The address token as written
    pub text: String,
    /// Parsed address, `None` if the token is not an IP address
    pub addr: Option<IpAddr>,
}

/// Address token of a line, if the line has one
pub fn address_token(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    line.split([',', '\t', ' ']).next().filter(|t| !t.is_empty())
}

/// Iterator over the address lines of a reader
pub struct Addresses<R> {
    lines: io::Lines<R>,
    number: usize,
}

/// Parse addresses out of `reader`
pub fn addresses<R: BufRead>(reader: R) -> Addresses<R> {
    Addresses {
        lines: reader.lines(),
        number: 0,
    }
}

impl<R: BufRead> Iterator for Addresses<R> {
    type Item = io::Result<AddressLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.number += 1;
            if let Some(token) = address_token(&line) {
                return Some(Ok(AddressLine {
                    number: self.number,
                    text: token.to_string(),
                    addr: token.parse().ok(),
                }));
            }
        }
    }
}
