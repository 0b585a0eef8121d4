//! Demonstration Modbus TCP server.
//!
//! Answers coil reads with an alternating pattern and backs the holding
//! registers with a process-local register bank that clients can write to.
//!
//! ```text
//! cargo run --example server -- 127.0.0.1:5502
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use modbus_tcp_server::{
    FunctionCode, HandlerError, ReadHandler, Server, Signedness, Value, WriteHandler,
};

type Bank = Mutex<HashMap<u16, Value>>;

/// Coil state for any address: even addresses are OFF, odd ones ON.
fn coil_pattern(_unit_id: u8, start: u16, quantity: u16) -> Result<Vec<Value>, HandlerError> {
    (start..start.saturating_add(quantity))
        .map(|addr| Value::new(i32::from(addr % 2)).map_err(HandlerError::from))
        .collect()
}

fn register_reader(bank: Arc<Bank>) -> ReadHandler {
    ReadHandler::new(move |_unit_id, start, quantity| {
        let bank = bank.lock().map_err(|_| "register bank poisoned")?;
        let mut values = Vec::with_capacity(usize::from(quantity));
        for addr in start..start.saturating_add(quantity) {
            let value = match bank.get(&addr) {
                Some(value) => *value,
                None => Value::new(0)?,
            };
            values.push(value);
        }
        Ok(values)
    })
}

fn register_writer(bank: Arc<Bank>) -> WriteHandler {
    WriteHandler::new(
        move |_unit_id, start, values| {
            let mut bank = bank.lock().map_err(|_| "register bank poisoned")?;
            for (offset, value) in values.iter().enumerate() {
                bank.insert(start.saturating_add(offset as u16), *value);
            }
            Ok(())
        },
        Signedness::Unsigned,
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5502".into());

    let mut server = Server::bind(&addr).with_context(|| format!("failed to bind {addr}"))?;
    server.set_timeout(Some(Duration::from_secs(30)));

    server.handle(FunctionCode::ReadCoils, ReadHandler::new(coil_pattern));
    server.handle(FunctionCode::ReadDiscreteInputs, ReadHandler::new(coil_pattern));

    let bank = Arc::new(Bank::default());
    server.handle(FunctionCode::ReadHoldingRegisters, register_reader(Arc::clone(&bank)));
    server.handle(FunctionCode::ReadInputRegisters, register_reader(Arc::clone(&bank)));
    server.handle(FunctionCode::WriteSingleRegister, register_writer(Arc::clone(&bank)));
    server.handle(FunctionCode::WriteMultipleRegisters, register_writer(bank));

    log::info!("listening on {addr}");
    server.listen();

    Ok(())
}
