//! Request handlers built from business callbacks.

use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::frame::{Exception, FunctionCode, Request, Response, Signedness, Value};
use crate::util::pack_coils;

/// Error type returned by business callbacks.
///
/// An error that downcasts to [`Exception`] selects the exception code of
/// the reply. Any other error type is answered with [`Exception::Acknowledge`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type ReadFn = Box<dyn Fn(u8, u16, u16) -> Result<Vec<Value>, HandlerError> + Send + Sync>;
type WriteFn = Box<dyn Fn(u8, u16, &[Value]) -> Result<(), HandlerError> + Send + Sync>;

/// A `Handler` responds to a Modbus request.
pub trait Handler: Send + Sync {
    /// Serve the request by writing exactly one response to `w`, either a
    /// success reply or an exception reply.
    ///
    /// An `Err` is an I/O failure while writing the response; the serving
    /// connection cannot be used any further.
    fn serve(&self, w: &mut dyn Write, req: &Request) -> io::Result<()>;
}

fn respond(w: &mut dyn Write, resp: &Response) -> io::Result<()> {
    w.write_all(&resp.encode())
}

fn exception_for(err: &HandlerError) -> Exception {
    err.downcast_ref::<Exception>()
        .copied()
        .unwrap_or(Exception::Acknowledge)
}

/// Responds to Modbus requests with function codes 1, 2, 3 and 4.
///
/// The callback is invoked with the unit id, the first requested address
/// and the number of requested addresses. It returns one [`Value`] per
/// address. For the coil codes (1 and 2) the values are reduced to a bit
/// field; for the register codes each value occupies 2 bytes of the reply,
/// in the returned order.
pub struct ReadHandler {
    handle: ReadFn,
}

impl ReadHandler {
    /// Create a new `ReadHandler` from a callback.
    pub fn new<F>(handle: F) -> Self
    where
        F: Fn(u8, u16, u16) -> Result<Vec<Value>, HandlerError> + Send + Sync + 'static,
    {
        ReadHandler {
            handle: Box::new(handle),
        }
    }
}

impl Handler for ReadHandler {
    fn serve(&self, w: &mut dyn Write, req: &Request) -> io::Result<()> {
        if req.data.len() < 4 {
            return respond(w, &Response::exception(req, Exception::IllegalDataValue));
        }
        let start = BigEndian::read_u16(&req.data[0..2]);
        let quantity = BigEndian::read_u16(&req.data[2..4]);

        let values = match (self.handle)(req.hdr.unit_id, start, quantity) {
            Ok(values) => values,
            Err(err) => return respond(w, &Response::exception(req, exception_for(&err))),
        };

        let data = match FunctionCode::new(req.function) {
            Some(FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs) => {
                pack_coils(&values)
            }
            _ => {
                let mut data = Vec::with_capacity(values.len() * 2);
                for value in &values {
                    data.extend_from_slice(&value.to_be_bytes());
                }
                data
            }
        };

        respond(w, &Response::new(req, data))
    }
}

/// Responds to Modbus requests with function codes 5, 6 and 16.
///
/// The callback is invoked with the unit id, the first written address and
/// the decoded values. Register values are decoded with the configured
/// [`Signedness`]; coil values are normalized to 0 or 1. On success the
/// reply echoes the address and value/quantity bytes of the request.
pub struct WriteHandler {
    handle: WriteFn,
    signedness: Signedness,
}

impl WriteHandler {
    /// Create a new `WriteHandler` from a callback.
    pub fn new<F>(handle: F, signedness: Signedness) -> Self
    where
        F: Fn(u8, u16, &[Value]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        WriteHandler {
            handle: Box::new(handle),
            signedness,
        }
    }

    fn decode(&self, req: &Request) -> Result<Vec<Value>, Exception> {
        if req.data.len() < 4 {
            return Err(Exception::IllegalDataValue);
        }
        match FunctionCode::new(req.function) {
            Some(FunctionCode::WriteSingleCoil) => {
                // any nonzero coil value means ON
                let raw = BigEndian::read_u16(&req.data[2..4]);
                let value =
                    Value::new(i32::from(raw != 0)).map_err(|_| Exception::IllegalDataValue)?;
                Ok(vec![value])
            }
            Some(FunctionCode::WriteSingleRegister) => {
                let value = Value::from_be_bytes(&req.data[2..4], self.signedness)
                    .map_err(|_| Exception::IllegalDataValue)?;
                Ok(vec![value])
            }
            Some(FunctionCode::WriteMultipleRegisters) => {
                let quantity = usize::from(BigEndian::read_u16(&req.data[2..4]));
                if req.data.len() != 5 + quantity * 2 {
                    return Err(Exception::IllegalDataValue);
                }
                let mut values = Vec::with_capacity(quantity);
                for i in 0..quantity {
                    let offset = 5 + i * 2;
                    let value = Value::from_be_bytes(&req.data[offset..offset + 2], self.signedness)
                        .map_err(|_| Exception::IllegalDataValue)?;
                    values.push(value);
                }
                Ok(values)
            }
            // unreachable through a registry populated with write codes only
            _ => Err(Exception::IllegalFunction),
        }
    }
}

impl Handler for WriteHandler {
    fn serve(&self, w: &mut dyn Write, req: &Request) -> io::Result<()> {
        let values = match self.decode(req) {
            Ok(values) => values,
            Err(exception) => return respond(w, &Response::exception(req, exception)),
        };

        let start = BigEndian::read_u16(&req.data[0..2]);
        if let Err(err) = (self.handle)(req.hdr.unit_id, start, &values) {
            return respond(w, &Response::exception(req, exception_for(&err)));
        }

        respond(w, &Response::new(req, req.data[0..4].to_vec()))
    }
}
