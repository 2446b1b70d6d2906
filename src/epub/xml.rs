//! quick-xml的小工具函数

use crate::epub::error::{EpubError, Result};
use quick_xml::events::BytesStart;
use quick_xml::events::attributes::Attribute;

/// 读取指定本地名称的属性值（实体已展开）
pub fn attribute_text(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attribute_value(&attr)));
        }
    }
    Ok(None)
}

/// 属性值文本，无法展开实体时退回原始字节
pub fn attribute_value(attr: &Attribute<'_>) -> String {
    match attr.unescape_value() {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
    }
}
