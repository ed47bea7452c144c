//! Register transport abstraction
//!
//! A transport performs one bounded register operation per call. Splitting
//! larger transfers is the job of [`crate::chunked::ChunkedTransport`].

use async_trait::async_trait;

use crate::error::Result;

/// Single-operation register read/write primitive
#[async_trait]
pub trait RegisterTransport: Send {
    /// Read `count` holding registers starting at `address`
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write `values` to consecutive holding registers starting at `address`
    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;

    /// Write one register
    async fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.write_registers(address, &[value]).await
    }
}

#[async_trait]
impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        (**self).read_registers(address, count).await
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        (**self).write_registers(address, values).await
    }

    async fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        (**self).write_register(address, value).await
    }
}
