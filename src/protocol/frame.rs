use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::Message;

/// Upper bound on a single frame payload
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("corrupt frame payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("unexpected message: {0}")]
    Unexpected(String),
}

/// Prefix `payload` with its big-endian u32 length
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one raw frame payload.
///
/// A clean EOF before the header is [`ProtocolError::Closed`]; an EOF
/// inside a frame is an IO error.
pub async fn read_raw_frame<R>(io: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = io.read(&mut len_bytes[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Err(ProtocolError::Closed)
            } else {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame header").into())
            };
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Reading half of a message link
pub struct FrameReader<R> {
    io: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R) -> Self {
        Self { io }
    }

    pub async fn recv(&mut self) -> Result<Message, ProtocolError> {
        let payload = read_raw_frame(&mut self.io).await?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

/// Writing half of a message link
pub struct FrameWriter<W> {
    io: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(io: W) -> Self {
        Self { io }
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(message)?;
        let frame = encode_frame(&payload)?;
        self.io.write_all(&frame).await?;
        self.io.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArticleRecord, JobId};

    fn task_with_body(body: &str) -> Message {
        Message::Task {
            id: JobId::new("7").unwrap(),
            article: ArticleRecord {
                title: "A".into(),
                link: "https://x/a".into(),
                content: Some(body.into()),
                image_url: None,
            },
        }
    }

    #[tokio::test]
    async fn test_payload_with_old_sentinels_survives() {
        let body = "quarterly ##### results #?#? beat 0 1 #####".repeat(40);
        let message = task_with_body(&body);

        // Small pipe buffer forces the frame through in many chunks
        let (client, server) = tokio::io::duplex(16);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let sent = message.clone();
        let send = tokio::spawn(async move { writer.send(&sent).await });
        let received = reader.recv().await.unwrap();
        send.await.unwrap().unwrap();

        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_raw_frame_reassembled_byte_identical() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let frame = encode_frame(&payload).unwrap();

        let mut builder = tokio_test::io::Builder::new();
        for chunk in frame.chunks(100) {
            builder.read(chunk);
        }
        let mut mock = builder.build();

        assert_eq!(read_raw_frame(&mut mock).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let mut bytes = encode_frame(b"{\"type\":\"status_query\"}").unwrap();
        bytes.extend(encode_frame(b"{\"type\":\"status\",\"busy\":false}").unwrap());

        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&bytes).build());
        assert_eq!(reader.recv().await.unwrap(), Message::StatusQuery);
        assert_eq!(reader.recv().await.unwrap(), Message::Status { busy: false });
    }

    #[tokio::test]
    async fn test_clean_eof_is_closed() {
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().build());
        assert!(matches!(reader.recv().await, Err(ProtocolError::Closed)));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let frame = encode_frame(b"{\"type\":\"shutdown\"}").unwrap();
        let mut mock = tokio_test::io::Builder::new().read(&frame[..6]).build();
        assert!(matches!(
            read_raw_frame(&mut mock).await,
            Err(ProtocolError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut mock = tokio_test::io::Builder::new().read(&header).build();
        assert!(matches!(
            read_raw_frame(&mut mock).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_corrupt() {
        let frame = encode_frame(b"#####").unwrap();
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&frame).build());
        assert!(matches!(reader.recv().await, Err(ProtocolError::Corrupt(_))));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
