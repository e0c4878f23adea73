// ─── Manifest Parser ───
// Streams a JNLP manifest through quick-xml and drives the tag state machine.
//
// Nothing is handed out until </jnlp> closes: information, resources and the
// descriptor kind are collected in a builder and only then assembled into a
// Descriptor, so a failed parse never leaves a partial result behind.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use super::specification::{fix_codebase, JnlpSpecification};
use super::tags::{transition, Tag};
use crate::core::cache::Cache;
use crate::core::descriptor::{
    AppletDesc, ApplicationDesc, Descriptor, DescriptorKind, ExtensionKind, Security,
};
use crate::core::information::{DescriptionKind, IconInfo, IconKind, Information, LocaleInfo};
use crate::core::platform::{Environment, Locale};
use crate::core::reference::{parse_keys, JavaRequirement, Reference, Resources};
use crate::core::version::parse_versions;

/// Structural failure of a manifest. Always fatal to the parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("misplaced <{tag}> tag")]
    Misplaced { tag: &'static str },

    #[error("</{tag}> end tag with no start")]
    UnmatchedEnd { tag: &'static str },

    #[error("<{tag}> requires the `{attribute}` attribute")]
    MissingAttribute {
        tag: &'static str,
        attribute: &'static str,
    },

    #[error("bad numeric value `{value}` for `{attribute}` in <{tag}>")]
    BadNumber {
        tag: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("bad URL `{value}` in <{tag}>: {reason}")]
    BadUrl {
        tag: &'static str,
        value: String,
        reason: String,
    },

    #[error("more than one jar defined as main")]
    DuplicateMainJar,

    #[error("no main jar defined")]
    NoMainJar,

    #[error("no default information with vendor and title defined")]
    NoDefaultInformation,

    #[error("missing <{0}> tag")]
    MissingTag(&'static str),

    #[error("<{tag}> after another descriptor kind was declared")]
    DuplicateDescriptor { tag: &'static str },

    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("I/O error reading manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a manifest read from `input`, fetched from `source`.
pub fn parse<R: BufRead>(
    input: R,
    source: &Url,
    cache: &Arc<dyn Cache>,
    env: &Environment,
) -> Result<Arc<Descriptor>, ParseError> {
    let mut reader = Reader::from_reader(input);
    let mut handler = Handler::new(source, cache, env);
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(reader.buffer_position() as u64, e))?;
        let position = reader.buffer_position() as u64;

        match event {
            Event::Start(element) => handler.start(&element, position)?,
            Event::Empty(element) => {
                handler.start(&element, position)?;
                handler.end(element.name().as_ref())?;
            }
            Event::End(element) => handler.end(element.name().as_ref())?,
            Event::Text(text) if handler.wants_text() => {
                let text = text.unescape().map_err(|e| xml_error(position, e))?;
                handler.text.push(&text);
            }
            Event::CData(data) if handler.wants_text() => {
                handler.text.push(&String::from_utf8_lossy(&data));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let descriptor = handler.finished.ok_or(ParseError::MissingTag("jnlp"))?;
    debug!("Parsed manifest {}", source);
    Ok(descriptor)
}

/// Parse a manifest held in memory.
pub fn parse_bytes(
    bytes: &[u8],
    source: &Url,
    cache: &Arc<dyn Cache>,
    env: &Environment,
) -> Result<Arc<Descriptor>, ParseError> {
    parse(bytes, source, cache, env)
}

fn xml_error(position: u64, e: quick_xml::Error) -> ParseError {
    match e {
        quick_xml::Error::Io(io) => ParseError::Io(std::io::Error::new(io.kind(), io.to_string())),
        other => ParseError::Xml {
            position,
            message: other.to_string(),
        },
    }
}

// ── Attributes ─────────────────────────────────────────

struct Attributes {
    tag: &'static str,
    values: HashMap<String, String>,
}

impl Attributes {
    fn read(tag: Tag, element: &BytesStart<'_>, position: u64) -> Result<Self, ParseError> {
        let mut values = HashMap::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| xml_error(position, e.into()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| xml_error(position, e))?
                .into_owned();
            values.insert(key, value);
        }

        Ok(Self {
            tag: tag.name(),
            values,
        })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn require(&self, name: &'static str) -> Result<&str, ParseError> {
        self.get(name).ok_or(ParseError::MissingAttribute {
            tag: self.tag,
            attribute: name,
        })
    }

    fn is(&self, name: &str, expected: &str) -> bool {
        self.get(name) == Some(expected)
    }

    fn number<T: std::str::FromStr>(&self, name: &'static str) -> Result<Option<T>, ParseError> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| ParseError::BadNumber {
                tag: self.tag,
                attribute: name,
                value: raw.to_string(),
            }),
        }
    }

    fn required_number<T: std::str::FromStr>(&self, name: &'static str) -> Result<T, ParseError> {
        self.number(name)?.ok_or(ParseError::MissingAttribute {
            tag: self.tag,
            attribute: name,
        })
    }
}

// ── Text ───────────────────────────────────────────────

/// Character data with whitespace runs collapsed to one space.
#[derive(Default)]
struct TextBuffer {
    text: String,
    pending_space: bool,
}

impl TextBuffer {
    fn clear(&mut self) {
        self.text.clear();
        self.pending_space = false;
    }

    fn push(&mut self, chunk: &str) {
        for c in chunk.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
            } else {
                if self.pending_space && !self.text.is_empty() {
                    self.text.push(' ');
                }
                self.pending_space = false;
                self.text.push(c);
            }
        }
    }

    fn take(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        self.pending_space = false;
        text
    }
}

// ── Handler ────────────────────────────────────────────

struct Handler<'a> {
    cache: &'a Arc<dyn Cache>,
    env: &'a Environment,
    source: Reference,

    state: Option<Tag>,
    text: TextBuffer,
    finished: Option<Arc<Descriptor>>,

    spec: Option<JnlpSpecification>,
    kind: Option<DescriptorKind>,
    security: Security,

    // <information>
    default_info: Option<Arc<LocaleInfo>>,
    locale_infos: Vec<(Locale, Arc<LocaleInfo>)>,
    first_locale: Option<Locale>,
    info: LocaleInfo,
    info_locales: Vec<Locale>,
    description_kind: Option<DescriptionKind>,

    // <resources>
    active: bool,
    first_jar: Option<Reference>,
    main_jar: Option<Reference>,
    references: Vec<Reference>,
    properties: Vec<(String, String)>,
    java: Vec<JavaRequirement>,
}

impl<'a> Handler<'a> {
    fn new(source: &Url, cache: &'a Arc<dyn Cache>, env: &'a Environment) -> Self {
        Self {
            cache,
            env,
            source: Reference::new(source.clone()),
            state: None,
            text: TextBuffer::default(),
            finished: None,
            spec: None,
            kind: None,
            security: Security::Sandbox,
            default_info: None,
            locale_infos: Vec::new(),
            first_locale: None,
            info: LocaleInfo::default(),
            info_locales: Vec::new(),
            description_kind: None,
            active: false,
            first_jar: None,
            main_jar: None,
            references: Vec::new(),
            properties: Vec::new(),
            java: Vec::new(),
        }
    }

    fn wants_text(&self) -> bool {
        matches!(
            self.state,
            Some(Tag::Title | Tag::Vendor | Tag::Description | Tag::Argument)
        )
    }

    fn start(&mut self, element: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        let Some(tag) = Tag::from_name(element.name().as_ref()) else {
            return Ok(());
        };
        self.state = transition(self.state, tag, true)?;
        let attrs = Attributes::read(tag, element, position)?;

        match tag {
            Tag::Jnlp => self.enter_jnlp(&attrs)?,
            Tag::Information => self.enter_information(&attrs),
            Tag::Title | Tag::Vendor | Tag::Argument => self.text.clear(),
            Tag::Description => {
                self.description_kind = DescriptionKind::parse(attrs.get("kind"));
                self.text.clear();
            }
            Tag::Homepage => self.info.homepage = self.url(&attrs, "href")?,
            Tag::Icon => self.enter_icon(&attrs)?,
            Tag::OfflineAllowed => self.info.offline_allowed = true,
            Tag::Resources => self.enter_resources(&attrs),
            Tag::Jar | Tag::Nativelib if self.active => self.enter_jar(tag, &attrs)?,
            Tag::Property if self.active => {
                let name = attrs.require("name")?.to_string();
                let value = attrs.get("value").unwrap_or_default().to_string();
                self.properties.push((name, value));
            }
            Tag::J2se | Tag::Jre if self.active => {
                let href = self.url(&attrs, "href")?;
                self.java.push(JavaRequirement {
                    versions: parse_versions(attrs.get("version")),
                    href,
                    initial_heap_size: attrs.get("initial-heap-size").map(str::to_string),
                    max_heap_size: attrs.get("max-heap-size").map(str::to_string),
                });
            }
            Tag::ApplicationDesc => {
                self.set_kind(
                    tag,
                    DescriptorKind::Application(ApplicationDesc {
                        main_class: attrs.get("main-class").map(str::to_string),
                        arguments: Vec::new(),
                    }),
                )?;
            }
            Tag::AppletDesc => self.enter_applet(&attrs)?,
            Tag::Param => {
                let name = attrs.require("name")?.to_string();
                let value = attrs.require("value")?.to_string();
                if let Some(DescriptorKind::Applet(applet)) = self.kind.as_mut() {
                    applet.params.insert(name, value);
                }
            }
            Tag::ComponentDesc => {
                self.set_kind(tag, DescriptorKind::Extension(ExtensionKind::Component))?
            }
            Tag::InstallerDesc => {
                self.set_kind(tag, DescriptorKind::Extension(ExtensionKind::Installer))?
            }
            Tag::AllPermissions => self.security = Security::AllPermissions,
            Tag::J2eeApplicationClientPermissions => {
                self.security = Security::J2eeApplicationClient
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), ParseError> {
        let Some(tag) = Tag::from_name(name) else {
            return Ok(());
        };
        self.state = transition(self.state, tag, false)?;

        match tag {
            Tag::Title => self.info.title = Some(self.text.take()),
            Tag::Vendor => self.info.vendor = Some(self.text.take()),
            Tag::Description => {
                let text = self.text.take();
                self.info.set_description(self.description_kind.take(), text);
            }
            Tag::Argument => {
                let text = self.text.take();
                if let Some(DescriptorKind::Application(app)) = self.kind.as_mut() {
                    app.arguments.push(text);
                }
            }
            Tag::Information => self.exit_information(),
            Tag::Resources => self.active = false,
            Tag::Jnlp => self.exit_jnlp()?,
            _ => {}
        }
        Ok(())
    }

    // ── <jnlp> ──

    fn enter_jnlp(&mut self, attrs: &Attributes) -> Result<(), ParseError> {
        let codebase = match attrs.get("codebase") {
            Some(raw) => Some(self.join(attrs.tag, self.source.url(), &fix_codebase(raw))?),
            None => None,
        };

        let reference = match attrs.get("href") {
            Some(raw) => {
                let base = codebase.as_ref().unwrap_or(self.source.url()).clone();
                let url = self.join(attrs.tag, &base, raw)?;
                Some(Reference::parse(url, attrs.get("version"), false))
            }
            None => None,
        };

        let spec = attrs.get("spec").map(|raw| parse_versions(Some(raw)));
        self.spec = Some(JnlpSpecification::new(reference, codebase, spec));
        Ok(())
    }

    fn exit_jnlp(&mut self) -> Result<(), ParseError> {
        let default_info = self
            .default_info
            .clone()
            .or_else(|| {
                let first = self.first_locale.as_ref()?;
                self.locale_infos
                    .iter()
                    .find(|(locale, _)| locale == first)
                    .map(|(_, info)| Arc::clone(info))
            })
            .filter(|info| info.vendor.is_some() && info.title.is_some())
            .ok_or(ParseError::NoDefaultInformation)?;

        let main_jar = self
            .main_jar
            .clone()
            .or_else(|| self.first_jar.clone())
            .ok_or(ParseError::NoMainJar)?;

        let kind = self
            .kind
            .take()
            .ok_or(ParseError::MissingTag("application-desc"))?;

        let mut information = Information::new(self.env.locale.clone());
        information.set_default(default_info);
        for (locale, info) in self.locale_infos.drain(..) {
            information.set_locale_info(locale, Some(info));
        }

        let mut resources = Resources::new();
        for reference in self.references.drain(..) {
            resources.add_reference(reference);
        }
        resources.set_main_jar(main_jar);
        for (name, value) in self.properties.drain(..) {
            resources.set_property(name, value);
        }
        for requirement in self.java.drain(..) {
            resources.add_java_requirement(requirement);
        }

        let spec = self
            .spec
            .take()
            .unwrap_or_else(|| JnlpSpecification::new(None, None, None));
        let source = spec.reference().cloned().unwrap_or_else(|| self.source.clone());

        let descriptor = Descriptor::new(self.cache, spec.codebase().cloned(), source, kind)
            .with_security(self.security);
        descriptor.set_context(Arc::new(spec));
        descriptor.set_information(information);
        descriptor.set_resources(resources);

        self.finished = Some(Arc::new(descriptor));
        Ok(())
    }

    fn set_kind(&mut self, tag: Tag, kind: DescriptorKind) -> Result<(), ParseError> {
        if self.kind.is_some() {
            return Err(ParseError::DuplicateDescriptor { tag: tag.name() });
        }
        self.kind = Some(kind);
        Ok(())
    }

    fn enter_applet(&mut self, attrs: &Attributes) -> Result<(), ParseError> {
        let name = attrs.require("name")?.to_string();
        let width = attrs.required_number("width")?;
        let height = attrs.required_number("height")?;

        let applet = AppletDesc {
            main_class: attrs.get("main-class").map(str::to_string),
            name,
            width,
            height,
            document_base: self.url(attrs, "documentbase")?,
            params: Default::default(),
        };
        self.set_kind(Tag::AppletDesc, DescriptorKind::Applet(applet))
    }

    // ── <information> ──

    fn enter_information(&mut self, attrs: &Attributes) {
        self.info_locales = attrs
            .get("locale")
            .map(|raw| raw.split_whitespace().map(Locale::parse).collect())
            .unwrap_or_default();
        self.info = LocaleInfo::default();
        self.description_kind = None;
    }

    fn exit_information(&mut self) {
        let info = Arc::new(std::mem::take(&mut self.info));
        let locales = std::mem::take(&mut self.info_locales);

        if locales.is_empty() {
            self.default_info = Some(info);
            return;
        }

        if self.first_locale.is_none() {
            self.first_locale = locales.first().cloned();
        }
        for locale in locales {
            self.locale_infos.retain(|(existing, _)| *existing != locale);
            self.locale_infos.push((locale, Arc::clone(&info)));
        }
    }

    fn enter_icon(&mut self, attrs: &Attributes) -> Result<(), ParseError> {
        let href = attrs.require("href")?;
        let url = self.resolve(attrs.tag, href)?;

        let icon = IconInfo {
            reference: Reference::parse(url, attrs.get("version"), false),
            width: attrs.number("width")?,
            height: attrs.number("height")?,
            depth: attrs.number("depth")?,
            size: attrs.number("size")?,
        };
        self.info.icons.insert(IconKind::parse(attrs.get("kind")), icon);
        Ok(())
    }

    // ── <resources> ──

    fn enter_resources(&mut self, attrs: &Attributes) {
        let locale = attrs.get("locale");
        let arch = attrs.get("arch");
        let os = attrs.get("os");

        self.active = arch.map_or(true, |raw| self.env.matches_arch(&parse_keys(raw)))
            && os.map_or(true, |raw| self.env.matches_os(&parse_keys(raw)))
            && locale.map_or(true, |raw| {
                let keys: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
                self.env.matches_locale(&keys)
            });

        if !self.active {
            debug!(
                "Skipping resources for locale={:?} arch={:?} os={:?}",
                locale, arch, os
            );
        }
    }

    fn enter_jar(&mut self, tag: Tag, attrs: &Attributes) -> Result<(), ParseError> {
        let url = self.resolve(attrs.tag, attrs.require("href")?)?;
        let lazy = attrs.is("download", "lazy");
        let reference = Reference::parse(url, attrs.get("version"), lazy);

        if tag == Tag::Nativelib {
            self.references.push(reference.native());
            return Ok(());
        }

        if attrs.is("main", "true") {
            if self.main_jar.is_some() {
                return Err(ParseError::DuplicateMainJar);
            }
            self.main_jar = Some(reference.clone());
        }
        if self.first_jar.is_none() {
            self.first_jar = Some(reference.clone());
        }
        self.references.push(reference);
        Ok(())
    }

    // ── URLs ──

    /// Optional URL attribute resolved against the manifest base.
    fn url(&self, attrs: &Attributes, name: &str) -> Result<Option<Url>, ParseError> {
        match attrs.get(name) {
            Some(raw) => self.resolve(attrs.tag, raw).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve against the codebase, else the manifest href, else the URL
    /// the manifest was read from.
    fn resolve(&self, tag: &'static str, href: &str) -> Result<Url, ParseError> {
        let base = self
            .spec
            .as_ref()
            .and_then(JnlpSpecification::codebase)
            .unwrap_or(self.source.url());
        self.join(tag, base, href)
    }

    fn join(&self, tag: &'static str, base: &Url, href: &str) -> Result<Url, ParseError> {
        base.join(href.trim()).map_err(|e| ParseError::BadUrl {
            tag,
            value: href.to_string(),
            reason: e.to_string(),
        })
    }
}
