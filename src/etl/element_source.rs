use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Annotation, ElementKind, RawElement};
use crate::errors::{Error, ErrorKind, Result};

/// Opens an .osm file for streaming. Files ending in `.xz` are decompressed
/// on the fly.
pub fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = fs::File::open(path)
        .map_err(|err| Error::new(ErrorKind::Io, format!("{}: {}", path.display(), err)))?;
    let file_reader = BufReader::new(file);

    if path.extension().is_some_and(|ext| ext == "xz") {
        let xz_reader = XzDecoder::new(file_reader);
        Ok(Box::new(BufReader::new(xz_reader)))
    } else {
        Ok(Box::new(file_reader))
    }
}

enum Step {
    Continue,
    Yield(RawElement),
    Eof,
}

/// The element currently being read, if any. This is all the document state
/// kept between events.
struct Cursor {
    kinds: Vec<ElementKind>,
    open: Option<RawElement>,
}

impl Cursor {
    fn read_element(kind: ElementKind, el: &BytesStart) -> Result<RawElement> {
        let mut element = RawElement::new(kind);
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.insert(key, value);
        }
        Ok(element)
    }

    fn read_child(open: &mut RawElement, el: &BytesStart) -> Result<()> {
        match el.name().as_ref() {
            b"tag" => {
                let mut key = None;
                let mut value = None;
                for attribute_res in el.attributes() {
                    let attribute = attribute_res?;
                    match attribute.key.as_ref() {
                        b"k" => key = Some(attribute.unescape_value()?.into_owned()),
                        b"v" => value = Some(attribute.unescape_value()?.into_owned()),
                        _ => (),
                    }
                }
                match (key, value) {
                    (Some(key), Some(value)) => open.annotations.push(Annotation::new(key, value)),
                    _ => return Err(Error::new(
                        ErrorKind::Xml,
                        format!("<tag> without k/v in {} {}", open.kind.as_str(), open.attribute("id").unwrap_or("?")),
                    )),
                }
            },
            b"nd" => {
                let mut node_ref = None;
                for attribute_res in el.attributes() {
                    let attribute = attribute_res?;
                    if attribute.key.as_ref() == b"ref" {
                        node_ref = Some(attribute.unescape_value()?.into_owned());
                    }
                }
                match node_ref {
                    Some(node_ref) => open.node_refs.push(node_ref),
                    None => return Err(Error::new(
                        ErrorKind::Xml,
                        format!("<nd> without ref in {} {}", open.kind.as_str(), open.attribute("id").unwrap_or("?")),
                    )),
                }
            },
            // Relation members and anything else are not kept.
            _ => (),
        }
        Ok(())
    }

    fn start(&mut self, el: &BytesStart, self_closing: bool) -> Result<Step> {
        let Some(kind) = ElementKind::from_tag_name(el.name().as_ref()) else {
            if let Some(open) = self.open.as_mut() {
                Cursor::read_child(open, el)?;
            }
            return Ok(Step::Continue);
        };

        if let Some(open) = &self.open {
            return Err(Error::new(
                ErrorKind::Xml,
                format!("<{}> nested inside {} {}", kind.as_str(), open.kind.as_str(), open.attribute("id").unwrap_or("?")),
            ));
        }
        if !self.kinds.contains(&kind) {
            return Ok(Step::Continue);
        }

        let element = Cursor::read_element(kind, el)?;
        if self_closing {
            Ok(Step::Yield(element))
        } else {
            self.open = Some(element);
            Ok(Step::Continue)
        }
    }

    fn accept(&mut self, event: Event) -> Result<Step> {
        match event {
            Event::Start(e) => self.start(&e, false),
            Event::Empty(e) => self.start(&e, true),
            Event::End(e) => {
                let closes_open = match (&self.open, ElementKind::from_tag_name(e.name().as_ref())) {
                    (Some(open), Some(kind)) => open.kind == kind,
                    _ => false,
                };
                match self.open.take() {
                    Some(element) if closes_open => Ok(Step::Yield(element)),
                    open => {
                        self.open = open;
                        Ok(Step::Continue)
                    },
                }
            },
            Event::Eof => match &self.open {
                Some(open) => Err(Error::new(
                    ErrorKind::Xml,
                    format!("document ended inside {} {}", open.kind.as_str(), open.attribute("id").unwrap_or("?")),
                )),
                None => Ok(Step::Eof),
            },
            _ => Ok(Step::Continue),
        }
    }
}

/// Lazily yields fully read elements of the requested kinds, in document order.
///
/// Only one element is held at a time and the event buffer is cleared after
/// every event, so memory use is bounded by the largest single element rather
/// than by the document. The sequence can be consumed once; reading the
/// document again means opening a new source.
pub struct ElementSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    cursor: Cursor,
    finished: bool,
}

impl<R: BufRead> ElementSource<R> {
    pub fn new(source: R, kinds: &[ElementKind]) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        ElementSource {
            reader,
            buf: Vec::new(),
            cursor: Cursor {
                kinds: kinds.to_vec(),
                open: None,
            },
            finished: false,
        }
    }

    fn next_element(&mut self) -> Result<Option<RawElement>> {
        loop {
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => self.cursor.accept(event),
                Err(err) => Err(Error::new(
                    ErrorKind::Xml,
                    format!("at byte {}: {}", self.reader.buffer_position(), err),
                )),
            };
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();

            match step? {
                Step::Continue => (),
                Step::Yield(element) => return Ok(Some(element)),
                Step::Eof => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
impl<R: BufRead> ElementSource<R> {
    /// Child entries (tags and node refs) held for a partially read element.
    pub fn retained_children(&self) -> usize {
        self.cursor.open.as_ref().map_or(0, RawElement::child_count)
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buf.len()
    }
}

impl<R: BufRead> Iterator for ElementSource<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor as IoCursor;

    use super::*;

    const NODES_AND_WAYS: [ElementKind; 2] = [ElementKind::Node, ElementKind::Way];

    fn source(xml: &str, kinds: &[ElementKind]) -> ElementSource<IoCursor<Vec<u8>>> {
        ElementSource::new(IoCursor::new(xml.as_bytes().to_vec()), kinds)
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="40.3" minlon="-3.8" maxlat="40.5" maxlon="-3.6"/>
  <node id="1" lat="40.41" lon="-3.70" user="ana" uid="7" version="2" changeset="11" timestamp="2016-01-01T00:00:00Z"/>
  <node id="2" lat="40.42" lon="-3.71">
    <tag k="name" v="Plaza de Oriente &amp; jardines"/>
    <tag k="tipo_via" v="Plaza"/>
  </node>
  <way id="10" user="ana" uid="7" version="1" changeset="12" timestamp="2016-01-02T00:00:00Z">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="pedestrian"/>
  </way>
  <relation id="100">
    <member type="way" ref="10" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    #[test]
    fn yields_selected_elements_in_document_order() {
        let elements: Vec<RawElement> = source(SAMPLE, &NODES_AND_WAYS)
            .collect::<Result<_>>()
            .unwrap();

        let ids: Vec<(ElementKind, &str)> = elements
            .iter()
            .map(|el| (el.kind, el.attribute("id").unwrap()))
            .collect();
        assert_eq!(ids, vec![(ElementKind::Node, "1"), (ElementKind::Node, "2"), (ElementKind::Way, "10")]);

        assert_eq!(elements[0].attribute("user"), Some("ana"));
        assert!(elements[0].annotations.is_empty());
        assert_eq!(
            elements[1].annotations,
            vec![
                Annotation::new("name", "Plaza de Oriente & jardines"),
                Annotation::new("tipo_via", "Plaza"),
            ]
        );
        assert_eq!(elements[2].node_refs, vec!["1", "2"]);
        assert_eq!(elements[2].annotations, vec![Annotation::new("highway", "pedestrian")]);
    }

    #[test]
    fn relations_only_when_requested() {
        let elements: Vec<RawElement> = source(SAMPLE, &[ElementKind::Relation])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Relation);
        assert_eq!(elements[0].annotations, vec![Annotation::new("type", "multipolygon")]);
        assert!(elements[0].node_refs.is_empty());
    }

    #[test]
    fn tags_of_skipped_elements_are_not_attached() {
        let xml = r#"<osm>
            <node id="1"><tag k="amenity" v="cafe"/></node>
            <way id="2" user="u" uid="1" version="1" changeset="1" timestamp="t"><nd ref="1"/></way>
        </osm>"#;

        let elements: Vec<RawElement> = source(xml, &[ElementKind::Way])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(elements.len(), 1);
        assert!(elements[0].annotations.is_empty());
    }

    #[test]
    fn truncated_document_yields_no_partial_element() {
        let xml = r#"<osm><node id="1"/><way id="2"><nd ref="1"/>"#;
        let mut elements = source(xml, &NODES_AND_WAYS);

        assert_eq!(elements.next().unwrap().unwrap().attribute("id"), Some("1"));
        let err = elements.next().unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Xml);
        assert!(elements.next().is_none());
    }

    #[test]
    fn tag_without_value_is_an_error() {
        let xml = r#"<osm><node id="1"><tag k="name"/></node></osm>"#;
        let err = source(xml, &NODES_AND_WAYS).next().unwrap().unwrap_err();
        assert!(err.message.contains("without k/v"));
    }

    #[test]
    fn retained_state_is_bounded_by_one_element() {
        let mut xml = String::from("<osm>\n");
        for id in 0..10_000 {
            if id % 2 == 0 {
                xml.push_str(&format!(r#"<node id="{}" lat="40.4" lon="-3.7"><tag k="name" v="n{}"/></node>"#, id, id));
            } else {
                xml.push_str(&format!(r#"<way id="{}"><nd ref="{}"/><nd ref="{}"/><tag k="highway" v="service"/></way>"#, id, id - 1, id + 1));
            }
            xml.push('\n');
        }
        xml.push_str("</osm>\n");

        let mut elements = source(&xml, &NODES_AND_WAYS);
        let mut count = 0;
        let mut largest_child_count = 0;
        while let Some(element) = elements.next() {
            let element = element.unwrap();
            assert_eq!(elements.retained_children(), 0);
            assert_eq!(elements.buffered_bytes(), 0);
            largest_child_count = largest_child_count.max(element.child_count());
            count += 1;
        }

        assert_eq!(count, 10_000);
        assert_eq!(largest_child_count, 3);
    }

    #[test]
    fn open_source_reads_xz_files() {
        use std::io::Write;
        use xz::write::XzEncoder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.osm.xz");
        let mut encoder = XzEncoder::new(fs::File::create(&path).unwrap(), 6);
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let elements: Vec<RawElement> = ElementSource::new(open_source(&path).unwrap(), &NODES_AND_WAYS)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(elements.len(), 3);
    }

    #[test]
    fn open_source_reports_missing_file() {
        let err = open_source(Path::new("/nonexistent/map.osm")).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.message.contains("/nonexistent/map.osm"));
    }
}
