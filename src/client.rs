//! Async client for the line protocol.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::model::{ItemId, Score};
use crate::protocol::EMPTY_SENTINEL;
use crate::stats::Stats;

pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// `update <id> <delta>`.
    pub async fn update(&mut self, id: ItemId, delta: Score) -> Result<()> {
        let reply = self.request(&format!("update {id} {delta}")).await?;
        match reply.as_str() {
            "OK" => Ok(()),
            other => Err(Error::Protocol(format!("update rejected: {other}"))),
        }
    }

    /// `next`. `None` when the queue is empty.
    pub async fn next(&mut self) -> Result<Option<ItemId>> {
        let reply = self.request("next").await?;
        let id: i64 = reply
            .parse()
            .map_err(|_| Error::Protocol(format!("unexpected reply to next: {reply}")))?;
        Ok((id != EMPTY_SENTINEL).then_some(ItemId(id)))
    }

    /// `stats`, read through the closing `END`.
    pub async fn stats(&mut self) -> Result<Stats> {
        self.send("stats").await?;
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "END" {
                break;
            }
            if !line.starts_with("STAT ") {
                return Err(Error::Protocol(format!("unexpected stats line: {line}")));
            }
            lines.push(line);
        }
        Ok(Stats::from_entries(lines.iter().filter_map(|line| {
            let mut parts = line.splitn(3, ' ').skip(1);
            Some((parts.next()?, parts.next()?))
        })))
    }

    /// Send one raw line and return the first reply line.
    pub async fn request(&mut self, line: &str) -> Result<String> {
        self.send(line).await?;
        self.read_line().await
    }

    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next reply line without its terminator.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send `quit` and wait for the server to close the connection.
    pub async fn quit(mut self) -> Result<()> {
        self.send("quit").await?;
        let mut rest = String::new();
        self.reader.read_line(&mut rest).await?;
        Ok(())
    }
}
