//! Common, IO-related code.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use flate2::bufread::MultiGzDecoder;

/// Transparently open a file with gzip decoder if its extension says so.
///
/// Used to read `.hmm` / `.hmm.gz` profile files (spec §6) without the
/// caller needing to know which compression, if any, was used.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = File::open(path)?;
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = File::open(path).map(BufReader::new)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    #[test]
    fn open_read_maybe_gz_plain() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.hmm");
        std::fs::File::create(&path)?.write_all(b"HMMER3/f\nLENG  42\n")?;

        let mut reader = super::open_read_maybe_gz(&path)?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        assert!(buf.contains("LENG  42"));
        Ok(())
    }

    #[test]
    fn open_read_maybe_gz_compressed() -> Result<(), anyhow::Error> {
        use flate2::{write::GzEncoder, Compression};

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.hmm.gz");
        let file = std::fs::File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"HMMER3/f\nLENG  17\n")?;
        encoder.finish()?;

        let mut reader = super::open_read_maybe_gz(&path)?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        assert!(buf.contains("LENG  17"));
        Ok(())
    }
}
