//! Specialized data structures
//!
//! - **[`ring_buffer`]**: fixed-capacity FIFO buffer backing the rolling
//!   operation window of the performance monitor

pub mod ring_buffer;

pub use ring_buffer::RingBuffer;
