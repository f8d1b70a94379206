//! Google Gemini generateContent backend
//!
//! # Example
//! ```no_run
//! use switchboard_core::message::Message;
//! use switchboard_core::providers::gemini;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = gemini::Client::builder("YOUR_API_KEY")
//!     .model(gemini::GEMINI_2_5_FLASH)
//!     .build()?;
//!
//! let response = client.generate_sync(&[Message::user("Hello!")], &[]).await?;
//! println!("{}", response.generation.text());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod completion;
pub mod streaming;

pub use client::{Client, ClientBuilder, Gemini};
pub use completion::{
    GEMINI_2_0_FLASH, GEMINI_2_5_FLASH, GEMINI_2_5_FLASH_LITE, GEMINI_2_5_PRO, supports_thinking,
};
