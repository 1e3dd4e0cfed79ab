//! `<GUP>` response document

use std::io;

use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{error::GupError, types::GupResponse};

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_document(writer: &mut Writer<Vec<u8>>, response: &GupResponse) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("GUP")))?;
    write_text_element(writer, "NeedToBeUpdated", yes_no(response.need_update))?;
    write_text_element(
        writer,
        "NeedToBeForceUpdated",
        yes_no(response.need_force_update),
    )?;
    write_text_element(writer, "Version", &response.version)?;
    write_text_element(writer, "Location", &response.location)?;
    writer.write_event(Event::End(BytesEnd::new("GUP")))
}

pub fn render(response: &GupResponse) -> Result<String, GupError> {
    let mut writer = Writer::new(Vec::new());
    write_document(&mut writer, response).map_err(|e| GupError::Xml(e.to_string()))?;
    String::from_utf8(writer.into_inner()).map_err(|e| GupError::Xml(e.to_string()))
}
