//! Namespace-agnostic extraction from ONVIF SOAP responses
//!
//! Devices disagree on prefixes (`tt:`, `tptz:`, none), so tags are matched
//! by local name only.

use crate::models::Position;

/// Locate the opening tag `<tag ...>` or `<ns:tag ...>`
///
/// Returns the byte offsets of `<` and of the closing `>`.
fn find_open_tag(xml: &str, tag: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(rel) = xml[from..].find(tag) {
        let pos = from + rel;
        from = pos + tag.len();

        let next = xml[from..].chars().next();
        if !matches!(next, Some(' ' | '\t' | '\r' | '\n' | '>' | '/')) {
            continue;
        }

        let Some(lt) = xml[..pos].rfind('<') else {
            continue;
        };
        let prefix = &xml[lt + 1..pos];
        let valid = prefix.is_empty()
            || prefix.strip_suffix(':').is_some_and(|ns| {
                ns.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
        if !valid {
            continue;
        }

        let gt = pos + xml[pos..].find('>')?;
        return Some((lt, gt));
    }
    None
}

/// Text content of the first `tag` element
pub fn element_text(xml: &str, tag: &str) -> Option<String> {
    let (_, gt) = find_open_tag(xml, tag)?;
    if xml[..gt].ends_with('/') {
        return None;
    }

    let content = &xml[gt + 1..];
    let end = content.find("</")?;
    let value = content[..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Attribute of the first `tag` element
pub fn element_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let (lt, gt) = find_open_tag(xml, tag)?;
    let head = &xml[lt..gt];
    let needle = format!("{}=", attr);

    let mut from = 0;
    while let Some(rel) = head[from..].find(needle.as_str()) {
        let pos = from + rel;
        from = pos + needle.len();

        if !head[..pos].ends_with(char::is_whitespace) {
            continue;
        }

        let rest = &head[from..];
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &rest[1..];
        let end = value.find(quote)?;
        return Some(value[..end].to_string());
    }
    None
}

/// Slice starting at the first `tag` element
fn section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    find_open_tag(xml, tag).map(|(lt, _)| &xml[lt..])
}

/// Token of the first media profile in a GetProfiles response
pub fn first_profile_token(xml: &str) -> Option<String> {
    element_attribute(xml, "Profiles", "token")
}

/// Service address advertised for `capability` in a GetCapabilities response
pub fn capability_xaddr(xml: &str, capability: &str) -> Option<String> {
    element_text(section(xml, capability)?, "XAddr")
}

/// Current position from a PTZ GetStatus response
pub fn parse_ptz_status(xml: &str) -> Option<Position> {
    let position = section(xml, "Position")?;

    let pan = element_attribute(position, "PanTilt", "x")?.parse().ok()?;
    let tilt = element_attribute(position, "PanTilt", "y")?.parse().ok()?;
    // some firmwares omit zoom on fixed-lens models
    let zoom = element_attribute(position, "Zoom", "x")
        .and_then(|z| z.parse().ok())
        .unwrap_or(0.0);

    Some(Position::new(pan, tilt, zoom))
}

/// SOAP fault reason, if the envelope carries one
pub fn soap_fault(xml: &str) -> Option<String> {
    let fault = section(xml, "Fault")?;
    Some(
        element_text(fault, "Text")
            .or_else(|| element_text(fault, "Value"))
            .unwrap_or_else(|| "unspecified SOAP fault".to_string()),
    )
}

/// True when a fault or body signals rejected credentials
pub fn is_auth_fault(xml: &str) -> bool {
    xml.contains("NotAuthorized") || xml.contains("FailedAuthentication")
}

/// Escape text for use inside an element body
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"<?xml version="1.0"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
  <env:Body>
    <tptz:GetStatusResponse>
      <tptz:PTZStatus>
        <tt:Position>
          <tt:PanTilt space="http://www.onvif.org/ver10/tptz/PanTiltSpaces/PositionGenericSpace" x="0.25" y="-0.5"/>
          <tt:Zoom space="http://www.onvif.org/ver10/tptz/ZoomSpaces/PositionGenericSpace" x="0.1"/>
        </tt:Position>
        <tt:MoveStatus><tt:PanTilt>IDLE</tt:PanTilt></tt:MoveStatus>
      </tptz:PTZStatus>
    </tptz:GetStatusResponse>
  </env:Body>
</env:Envelope>"#;

    #[test]
    fn test_parse_ptz_status() {
        let p = parse_ptz_status(STATUS).unwrap();
        assert_eq!(p.pan, 0.25);
        assert_eq!(p.tilt, -0.5);
        assert_eq!(p.zoom, 0.1);
    }

    #[test]
    fn test_status_without_position() {
        assert!(parse_ptz_status("<tptz:GetStatusResponse/>").is_none());
    }

    #[test]
    fn test_first_profile_token() {
        let xml = r#"<trt:GetProfilesResponse>
            <trt:Profiles fixed="true" token="MainStream"><tt:Name>main</tt:Name></trt:Profiles>
            <trt:Profiles fixed="true" token="SubStream"></trt:Profiles>
        </trt:GetProfilesResponse>"#;
        assert_eq!(first_profile_token(xml).as_deref(), Some("MainStream"));
    }

    #[test]
    fn test_element_text_ignores_closing_and_longer_tags() {
        let xml = "<a:ModelName>X</a:ModelName><a:Model>PTZ-1</a:Model>";
        assert_eq!(element_text(xml, "Model").as_deref(), Some("PTZ-1"));
    }

    #[test]
    fn test_capability_xaddr() {
        let xml = r#"<tds:Capabilities>
            <tt:Device><tt:XAddr>http://10.0.0.9/onvif/device_service</tt:XAddr></tt:Device>
            <tt:Media><tt:XAddr>http://10.0.0.9/onvif/Media</tt:XAddr></tt:Media>
            <tt:PTZ><tt:XAddr>http://10.0.0.9/onvif/PTZ</tt:XAddr></tt:PTZ>
        </tds:Capabilities>"#;
        assert_eq!(
            capability_xaddr(xml, "PTZ").as_deref(),
            Some("http://10.0.0.9/onvif/PTZ")
        );
        assert_eq!(
            capability_xaddr(xml, "Media").as_deref(),
            Some("http://10.0.0.9/onvif/Media")
        );
        assert!(capability_xaddr(xml, "Imaging").is_none());
    }

    #[test]
    fn test_soap_fault() {
        let xml = r#"<s:Envelope><s:Body><s:Fault>
            <s:Code><s:Value>s:Sender</s:Value><s:Subcode><s:Value>ter:NotAuthorized</s:Value></s:Subcode></s:Code>
            <s:Reason><s:Text xml:lang="en">Sender not Authorized</s:Text></s:Reason>
        </s:Fault></s:Body></s:Envelope>"#;
        assert_eq!(soap_fault(xml).as_deref(), Some("Sender not Authorized"));
        assert!(is_auth_fault(xml));
        assert!(soap_fault(STATUS).is_none());
    }

    #[test]
    fn test_escape_markup_characters() {
        assert_eq!(escape("admin"), "admin");
        assert_eq!(escape(r#"a&b<c>"'"#), "a&amp;b&lt;c&gt;&quot;&apos;");
    }
}
