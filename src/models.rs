//! Protocol vocabulary shared by the client and the capi server.
//!
//! Two closed sets live here: the [`WireCommand`] ids carried in every frame
//! header, and the local [`ControlOp`] codes a CAPI application hands to the
//! dispatcher. Control codes follow the BSD `ioctl` encoding, so the payload
//! length of every operation can be read back out of its code.

use serde::{Deserialize, Serialize};

/// Size of the parameter field in an ioctl code.
pub const IOCPARM_MASK: u32 = 0x1fff;
/// Copy parameters out of the kernel (or server) into the caller buffer.
pub const IOC_OUT: u32 = 0x4000_0000;
/// Copy parameters from the caller buffer in.
pub const IOC_IN: u32 = 0x8000_0000;
pub const IOC_INOUT: u32 = IOC_IN | IOC_OUT;

/// ioctl group byte of the CAPI control operations.
const CAPI_GROUP: u8 = b'C';

/// `struct capi_register_req`: five 32-bit fields.
pub const REGISTER_REQ_SIZE: usize = 20;
/// Controller selector followed by a 64-byte manufacturer string.
pub const MANUFACTURER_REQ_SIZE: usize = 68;
/// Controller selector followed by four 32-bit version numbers.
pub const VERSION_REQ_SIZE: usize = 20;
/// Controller selector followed by an 8-byte serial number.
pub const SERIAL_REQ_SIZE: usize = 12;
/// Controller selector followed by the 64-byte CAPI profile.
pub const PROFILE_REQ_SIZE: usize = 68;
/// A lone 32-bit value (controller selector, stack version, int flag).
pub const WORD_REQ_SIZE: usize = 4;

/// Build an ioctl code from its direction, group, number and parameter length.
pub const fn ioc(inout: u32, group: u8, num: u8, len: usize) -> u32 {
    inout | (((len as u32) & IOCPARM_MASK) << 16) | ((group as u32) << 8) | num as u32
}

/// Parameter length encoded in an ioctl code.
pub const fn iocparm_len(code: u32) -> usize {
    ((code >> 16) & IOCPARM_MASK) as usize
}

/// `FIONBIO`: toggle non-blocking I/O on the underlying socket.
pub const FIONBIO: u32 = ioc(IOC_IN, b'f', 126, WORD_REQ_SIZE);
pub const CAPI_REGISTER_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 1, REGISTER_REQ_SIZE);
pub const CAPI_GET_MANUFACTURER_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 2, MANUFACTURER_REQ_SIZE);
pub const CAPI_GET_VERSION_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 3, VERSION_REQ_SIZE);
pub const CAPI_GET_SERIAL_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 4, SERIAL_REQ_SIZE);
pub const CAPI_GET_PROFILE_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 5, PROFILE_REQ_SIZE);
pub const CAPI_START_D_CHANNEL_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 6, WORD_REQ_SIZE);
pub const CAPI_SET_STACK_VERSION_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 7, WORD_REQ_SIZE);
pub const CAPI_IOCTL_TEST_REQ: u32 = ioc(IOC_INOUT, CAPI_GROUP, 8, WORD_REQ_SIZE);

/// Command id carried in byte 2 of every frame header.
///
/// Numbering is positional and shared with the server; never reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WireCommand {
    Message = 0,
    Register = 1,
    Manufacturer = 2,
    Version = 3,
    Serial = 4,
    Profile = 5,
    Start = 6,
}

impl WireCommand {
    pub const ALL: [WireCommand; 7] = [
        WireCommand::Message,
        WireCommand::Register,
        WireCommand::Manufacturer,
        WireCommand::Version,
        WireCommand::Serial,
        WireCommand::Profile,
        WireCommand::Start,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WireCommand::Message => "MESSAGE",
            WireCommand::Register => "REGISTER",
            WireCommand::Manufacturer => "MANUFACTURER",
            WireCommand::Version => "VERSION",
            WireCommand::Serial => "SERIAL",
            WireCommand::Profile => "PROFILE",
            WireCommand::Start => "START",
        }
    }
}

/// How the payload of a wire operation is converted around the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marshalling {
    /// Five 32-bit registration fields.
    Register,
    /// The leading 32-bit controller selector only.
    Controller,
    /// Bytes go out untouched.
    None,
}

/// What the dispatcher does with an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    /// Hand the flag straight to the socket.
    PassThrough,
    /// Run one framed transaction.
    Wire(WireCommand, Marshalling),
    /// Succeed without touching the connection.
    Local,
}

/// The local control-operation vocabulary accepted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    NonBlockingIo,
    Register,
    GetManufacturer,
    GetVersion,
    GetSerial,
    GetProfile,
    StartDChannel,
    SetStackVersion,
    IoctlTest,
}

impl ControlOp {
    pub const ALL: [ControlOp; 9] = [
        ControlOp::NonBlockingIo,
        ControlOp::Register,
        ControlOp::GetManufacturer,
        ControlOp::GetVersion,
        ControlOp::GetSerial,
        ControlOp::GetProfile,
        ControlOp::StartDChannel,
        ControlOp::SetStackVersion,
        ControlOp::IoctlTest,
    ];

    /// The ioctl code for this operation.
    pub fn code(self) -> u32 {
        match self {
            ControlOp::NonBlockingIo => FIONBIO,
            ControlOp::Register => CAPI_REGISTER_REQ,
            ControlOp::GetManufacturer => CAPI_GET_MANUFACTURER_REQ,
            ControlOp::GetVersion => CAPI_GET_VERSION_REQ,
            ControlOp::GetSerial => CAPI_GET_SERIAL_REQ,
            ControlOp::GetProfile => CAPI_GET_PROFILE_REQ,
            ControlOp::StartDChannel => CAPI_START_D_CHANNEL_REQ,
            ControlOp::SetStackVersion => CAPI_SET_STACK_VERSION_REQ,
            ControlOp::IoctlTest => CAPI_IOCTL_TEST_REQ,
        }
    }

    /// Look up an ioctl code. Unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Payload bytes that accompany this operation.
    ///
    /// This is the protocol's own table; the code's embedded length must
    /// agree with it.
    pub fn payload_len(self) -> usize {
        match self {
            ControlOp::NonBlockingIo => WORD_REQ_SIZE,
            ControlOp::Register => REGISTER_REQ_SIZE,
            ControlOp::GetManufacturer => MANUFACTURER_REQ_SIZE,
            ControlOp::GetVersion => VERSION_REQ_SIZE,
            ControlOp::GetSerial => SERIAL_REQ_SIZE,
            ControlOp::GetProfile => PROFILE_REQ_SIZE,
            ControlOp::StartDChannel => WORD_REQ_SIZE,
            ControlOp::SetStackVersion => WORD_REQ_SIZE,
            ControlOp::IoctlTest => WORD_REQ_SIZE,
        }
    }

    pub fn action(self) -> OpAction {
        match self {
            ControlOp::NonBlockingIo => OpAction::PassThrough,
            ControlOp::Register => OpAction::Wire(WireCommand::Register, Marshalling::Register),
            ControlOp::GetManufacturer => {
                OpAction::Wire(WireCommand::Manufacturer, Marshalling::Controller)
            }
            ControlOp::GetVersion => OpAction::Wire(WireCommand::Version, Marshalling::Controller),
            ControlOp::GetSerial => OpAction::Wire(WireCommand::Serial, Marshalling::Controller),
            ControlOp::GetProfile => OpAction::Wire(WireCommand::Profile, Marshalling::Controller),
            ControlOp::StartDChannel => OpAction::Wire(WireCommand::Start, Marshalling::None),
            ControlOp::SetStackVersion | ControlOp::IoctlTest => OpAction::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlOp::NonBlockingIo => "FIONBIO",
            ControlOp::Register => "CAPI_REGISTER_REQ",
            ControlOp::GetManufacturer => "CAPI_GET_MANUFACTURER_REQ",
            ControlOp::GetVersion => "CAPI_GET_VERSION_REQ",
            ControlOp::GetSerial => "CAPI_GET_SERIAL_REQ",
            ControlOp::GetProfile => "CAPI_GET_PROFILE_REQ",
            ControlOp::StartDChannel => "CAPI_START_D_CHANNEL_REQ",
            ControlOp::SetStackVersion => "CAPI_SET_STACK_VERSION_REQ",
            ControlOp::IoctlTest => "CAPI_IOCTL_TEST_REQ",
        }
    }
}
