use std::io::{ErrorKind, Read, Result};

/// Reads into `buf` until it is full or the reader reports end of file, possibly performing
/// multiple reads to do so (and also retrying if required to deal with EINTR).
///
/// Unlike `Read::read()`, a short count means that the end of the stream was reached; unlike
/// `Read::read_exact()`, reaching it early is not an error.
///
/// # Return value
///
/// The number of bytes placed at the start of `buf`, or the first error from the underlying
/// reader.
pub(crate) fn read_upto(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut done = 0;

    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(done)
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;

    /// Hands out at most three bytes per call, with an EINTR in between.
    struct Dribble<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Dribble<'_> {
        fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(ErrorKind::Interrupted.into());
            }
            let n = buffer.len().min(self.data.len()).min(3);
            buffer[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_upto() {
        let mut r = b"ninebytes" as &[u8];
        let mut buf = [0; 4];
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"nine");
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 4);
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], b's');
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_upto_short_reads() {
        let mut r = Dribble {
            data: b"eighteen(18) bytes",
            interrupt: false,
        };
        let mut buf = [0; 16];
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 16);
        assert_eq!(&buf, b"eighteen(18) byt");
        assert_eq!(read_upto(&mut r, &mut buf).unwrap(), 2);
    }

    #[test]
    fn test_read_upto_broken_reader() {
        struct BrokenReader;
        impl Read for BrokenReader {
            fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
                Err(ErrorKind::NetworkDown.into())
            }
        }

        let err = read_upto(&mut BrokenReader, &mut [0; 9]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkDown);
    }
}
