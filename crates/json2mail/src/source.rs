//! Input selection: standard input or a file.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::debug;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Where mail records are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Standard input.
    Stdin,
    /// A file on disk.
    File(PathBuf),
}

impl Source {
    /// Interprets a `--source` value; `-` and the empty string mean stdin.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "-" => Self::Stdin,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Opens the source for reading.
    ///
    /// A file starting with a UTF-8 byte order mark is read from just after
    /// it; standard input is passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or rewound.
    pub fn open(&self) -> io::Result<Box<dyn BufRead>> {
        match self {
            Self::Stdin => Ok(Box::new(io::stdin().lock())),
            Self::File(path) => {
                let mut file = File::open(path)?;
                if skip_bom(&mut file)? {
                    debug!(path = %path.display(), "skipped byte order mark");
                }
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("-"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Consumes a leading UTF-8 byte order mark. Anything else is rewound to
/// offset zero so no byte is lost.
///
/// # Errors
///
/// Returns an error if reading or seeking fails.
pub fn skip_bom<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut head = [0_u8; 3];
    let mut filled = 0;
    while filled < head.len() {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }

    if filled == head.len() && head == UTF8_BOM {
        return Ok(true);
    }
    reader.seek(SeekFrom::Start(0))?;
    Ok(false)
}
