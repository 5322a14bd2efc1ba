//! MLLP (Minimal Lower Layer Protocol) transport
//!
//! MLLP frames HL7 messages for transmission over TCP:
//! \<VT\>message\<FS\>\<CR\>
//! - VT (Vertical Tab): 0x0B - start of block
//! - FS (File Separator): 0x1C - end of block
//! - CR (Carriage Return): 0x0D - end of frame
//!
//! There is no length prefix; the codec scans the stream. The server and
//! client both drive the codec through `tokio_util::codec::Framed`.

pub mod client;
pub mod codec;
pub mod server;

pub use client::{MllpClient, MllpClientConfig, MllpClientHandle};
pub use codec::{DecodedFrame, MllpCodec, CARRIAGE_RETURN, END_OF_BLOCK, START_OF_BLOCK};
pub use server::{ConnectionInfo, MllpEvents, MllpServer, MllpServerConfig, Reply};
