use std::path::Path;

use tracing::warn;

use crate::{detector::Notify, error::Result};

/// Notification clip, decoded fresh and played detached on every death.
pub struct Sound {
    inner: backend::Player,
}

impl Sound {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Sound {
            inner: backend::Player::open(path)?,
        })
    }

    /// Returns as soon as playback has started.
    pub fn play(&self) -> Result<()> {
        self.inner.play()
    }
}

impl Notify for Sound {
    fn notify(&mut self, _count: u64) {
        if let Err(err) = self.play() {
            warn!(%err, "failed to play death sound");
        }
    }
}

#[cfg(windows)]
mod backend {
    use std::{fs, io::Cursor, path::Path, sync::Arc};

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use crate::error::{Error, Result};

    pub struct Player {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        clip: Arc<[u8]>,
    }

    impl Player {
        pub fn open(path: &Path) -> Result<Self> {
            let clip: Arc<[u8]> = fs::read(path)
                .map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                })?
                .into();

            // Fail at startup rather than on the first death.
            Decoder::new(Cursor::new(Arc::clone(&clip))).map_err(|e| Error::Audio(e.to_string()))?;

            let (stream, handle) =
                OutputStream::try_default().map_err(|e| Error::Audio(e.to_string()))?;

            Ok(Player {
                _stream: stream,
                handle,
                clip,
            })
        }

        pub fn play(&self) -> Result<()> {
            let sink = Sink::try_new(&self.handle).map_err(|e| Error::Audio(e.to_string()))?;
            let source = Decoder::new(Cursor::new(Arc::clone(&self.clip)))
                .map_err(|e| Error::Audio(e.to_string()))?;

            sink.append(source);
            sink.detach();

            Ok(())
        }
    }
}

#[cfg(not(windows))]
mod backend {
    use std::path::Path;

    use crate::error::{Error, Result};

    pub struct Player;

    impl Player {
        pub fn open(_path: &Path) -> Result<Self> {
            Err(Error::Unsupported("sound playback"))
        }

        pub fn play(&self) -> Result<()> {
            Err(Error::Unsupported("sound playback"))
        }
    }
}
