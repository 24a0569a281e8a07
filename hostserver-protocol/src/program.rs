//! Program calls through the remote command server.
//!
//! The parameters of a call travel in one parameter list code point holding a chain of
//! parameter code points, in call order.
use crate::binary::{get_i32, get_u16, get_u32, read_i32};
use crate::ccsid::CharConverter;
use crate::codepoint::{CodePoint, encode_chain};
use crate::datastream::{Datastream, server};
use crate::error::ReadError;
use crate::message::{HostMessage, encode_message_list};
use crate::template::{
    CALL_PROGRAM_REPLY, CALL_PROGRAM_REQUEST, CP_PARAMETER, CP_PARAMETER_LIST,
    ProgramCallReplyTemplate, ProgramCallTemplate,
};

const PARAMETER_HEADER_LEN: usize = 6;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterUsage {
    Input = 1,
    Output = 2,
    InputOutput = 3,
}

impl TryFrom<u16> for ParameterUsage {
    type Error = ReadError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ParameterUsage::Input),
            2 => Ok(ParameterUsage::Output),
            3 => Ok(ParameterUsage::InputOutput),
            other => Err(ReadError::InvalidFormat(format!(
                "Invalid parameter usage {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramParameter {
    pub usage: ParameterUsage,
    /// Number of bytes the program may write into this parameter
    pub max_length: u32,
    pub data: Vec<u8>,
}

impl ProgramParameter {
    pub fn input(data: impl Into<Vec<u8>>) -> ProgramParameter {
        let data = data.into();
        ProgramParameter {
            usage: ParameterUsage::Input,
            max_length: data.len() as u32,
            data,
        }
    }

    /// A 4-byte binary input, the `BINARY(4)` of the host APIs.
    pub fn input_i32(value: i32) -> ProgramParameter {
        ProgramParameter::input(value.to_be_bytes().to_vec())
    }

    pub fn output(max_length: u32) -> ProgramParameter {
        ProgramParameter {
            usage: ParameterUsage::Output,
            max_length,
            data: Vec::new(),
        }
    }

    pub fn input_output(data: impl Into<Vec<u8>>, max_length: u32) -> ProgramParameter {
        ProgramParameter {
            usage: ParameterUsage::InputOutput,
            max_length,
            data: data.into(),
        }
    }

    pub fn as_i32(&self) -> Result<i32, ReadError> {
        read_i32(&self.data, 0, "binary parameter")
    }

    pub fn to_code_point(&self) -> CodePoint {
        let mut payload = Vec::with_capacity(PARAMETER_HEADER_LEN + self.data.len());
        payload.extend_from_slice(&self.max_length.to_be_bytes());
        payload.extend_from_slice(&(self.usage as u16).to_be_bytes());
        payload.extend_from_slice(&self.data);
        CodePoint::new(CP_PARAMETER, payload)
    }

    pub fn from_payload(payload: &[u8]) -> Result<ProgramParameter, ReadError> {
        crate::binary::ensure(payload, 0, PARAMETER_HEADER_LEN, "program parameter")?;
        let max_length = get_u32(payload, 0);
        let usage = ParameterUsage::try_from(get_u16(payload, 4))?;
        let data = &payload[PARAMETER_HEADER_LEN..];
        if data.len() > max_length as usize {
            return Err(ReadError::InvalidLength {
                what: "program parameter",
                declared: data.len(),
                offset: PARAMETER_HEADER_LEN,
                remaining: max_length as usize,
            });
        }
        Ok(ProgramParameter {
            usage,
            max_length,
            data: data.to_vec(),
        })
    }
}

fn parameter_list(parameters: &[ProgramParameter]) -> CodePoint {
    let entries: Vec<CodePoint> = parameters.iter().map(ProgramParameter::to_code_point).collect();
    CodePoint::new(CP_PARAMETER_LIST, encode_chain(&entries))
}

/// Decodes the parameter list of a request or reply. A missing list means no parameters.
pub fn parameters(ds: &Datastream) -> Result<Vec<ProgramParameter>, ReadError> {
    let Some(list) = ds.code_point(CP_PARAMETER_LIST) else {
        return Ok(Vec::new());
    };
    let mut parameters = Vec::new();
    for entry in list.chain() {
        let entry = entry?;
        if entry.id != CP_PARAMETER {
            return Err(ReadError::InvalidFormat(format!(
                "Unexpected code point 0x{:04X} in parameter list",
                entry.id
            )));
        }
        parameters.push(ProgramParameter::from_payload(entry.data)?);
    }
    Ok(parameters)
}

/// A decoded program call request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramCall {
    pub library: String,
    pub program: String,
    pub parameters: Vec<ProgramParameter>,
}

impl ProgramCall {
    pub fn new(
        library: impl Into<String>,
        program: impl Into<String>,
        parameters: Vec<ProgramParameter>,
    ) -> ProgramCall {
        ProgramCall {
            library: library.into(),
            program: program.into(),
            parameters,
        }
    }

    pub fn to_request(&self, converter: &dyn CharConverter) -> Result<Datastream, ReadError> {
        let template = ProgramCallTemplate {
            program: self.program.clone(),
            library: self.library.clone(),
            message_option: 0,
            parameter_count: self.parameters.len() as u16,
        };
        let mut ds = Datastream::new(
            server::REMOTE_COMMAND,
            CALL_PROGRAM_REQUEST,
            template.to_bytes(converter)?,
        );
        ds.set_code_point(parameter_list(&self.parameters));
        Ok(ds)
    }

    pub fn from_request(
        ds: &Datastream,
        converter: &dyn CharConverter,
    ) -> Result<ProgramCall, ReadError> {
        let template = ProgramCallTemplate::parse(ds.template(), converter)?;
        let parameters = parameters(ds)?;
        if parameters.len() != template.parameter_count as usize {
            return Err(ReadError::InvalidFormat(format!(
                "Program call declares {} parameters but carries {}",
                template.parameter_count,
                parameters.len()
            )));
        }
        Ok(ProgramCall {
            library: template.library,
            program: template.program,
            parameters,
        })
    }
}

/// Builds the reply to a program call.
pub fn call_reply(
    correlation_id: u32,
    return_code: u16,
    parameters: &[ProgramParameter],
    messages: &[HostMessage],
    converter: &dyn CharConverter,
) -> Result<Datastream, ReadError> {
    let mut ds = Datastream::new(
        server::REMOTE_COMMAND,
        CALL_PROGRAM_REPLY,
        ProgramCallReplyTemplate { return_code }.to_bytes(),
    );
    ds.set_correlation_id(correlation_id);
    ds.set_code_point(parameter_list(parameters));
    ds.set_code_point(encode_message_list(messages, converter)?);
    Ok(ds)
}

/// Reads a big-endian `BINARY(4)` out of an output parameter at `offset`.
pub fn parameter_i32(parameter: &ProgramParameter, offset: usize) -> Result<i32, ReadError> {
    crate::binary::ensure(&parameter.data, offset, 4, "binary parameter")?;
    Ok(get_i32(&parameter.data, offset))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ccsid::Ebcdic37;
    use crate::message::decode_message_list;
    use crate::registry::DatastreamRegistry;
    use crate::template::CP_MESSAGE_LIST;

    #[test]
    fn request_round_trip() {
        let call = ProgramCall::new(
            "QSYS",
            "QGYGTLE",
            vec![
                ProgramParameter::output(100),
                ProgramParameter::input_i32(100),
                ProgramParameter::input(vec![0, 0, 0, 1]),
                ProgramParameter::input_output(vec![0; 8], 8),
            ],
        );
        let request = call.to_request(&Ebcdic37).unwrap();
        let parsed =
            Datastream::parse(&request.to_bytes().unwrap(), &DatastreamRegistry::with_defaults()).unwrap();
        assert_eq!(ProgramCall::from_request(&parsed, &Ebcdic37).unwrap(), call);
    }

    #[test]
    fn parameter_count_must_match() {
        let call = ProgramCall::new("QSYS", "QGYCLST", vec![ProgramParameter::input(vec![1])]);
        let mut request = call.to_request(&Ebcdic37).unwrap();
        request.template_mut()[22] = 2;
        assert!(ProgramCall::from_request(&request, &Ebcdic37).is_err());
    }

    #[test]
    fn reply_with_messages() {
        let reply = call_reply(
            9,
            0x0500,
            &[],
            &[HostMessage::new("CPF9801", "Object not found.", 40)],
            &Ebcdic37,
        )
        .unwrap();
        let parsed =
            Datastream::parse(&reply.to_bytes().unwrap(), &DatastreamRegistry::with_defaults()).unwrap();
        assert_eq!(parsed.correlation_id(), 9);
        assert!(parameters(&parsed).unwrap().is_empty());
        let messages =
            decode_message_list(parsed.code_point(CP_MESSAGE_LIST).unwrap(), &Ebcdic37).unwrap();
        assert_eq!(messages[0].id, "CPF9801");
    }

    #[test]
    fn parameter_data_exceeding_max_length() {
        let mut payload = vec![0, 0, 0, 1, 0, 1];
        payload.extend_from_slice(&[1, 2]);
        assert!(ProgramParameter::from_payload(&payload).is_err());
        assert!(ProgramParameter::from_payload(&[0, 0, 0, 0, 0, 9]).is_err());
    }

    #[test]
    fn binary_parameter() {
        assert_eq!(ProgramParameter::input_i32(-7).as_i32().unwrap(), -7);
        assert_eq!(
            parameter_i32(&ProgramParameter::input(vec![0, 0, 0, 0, 0, 0, 1, 0]), 4).unwrap(),
            256
        );
        assert!(ProgramParameter::output(4).as_i32().is_err());
    }
}
