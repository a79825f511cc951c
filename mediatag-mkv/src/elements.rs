//! Matroska element IDs.
//!
//! IDs are stored with their VINT marker bit, as they appear on disk.
//! Only the elements the tag editor touches are listed; unknown elements are
//! preserved verbatim on rewrite.

// =============================================================================
// EBML header
// =============================================================================

/// EBML header.
pub const EBML: u32 = 0x1A45DFA3;
/// EBMLVersion.
pub const EBML_VERSION: u32 = 0x4286;
/// EBMLReadVersion.
pub const EBML_READ_VERSION: u32 = 0x42F7;
/// EBMLMaxIDLength.
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
/// EBMLMaxSizeLength.
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
/// DocType.
pub const DOC_TYPE: u32 = 0x4282;
/// DocTypeVersion.
pub const DOC_TYPE_VERSION: u32 = 0x4287;
/// DocTypeReadVersion.
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

// =============================================================================
// Global elements
// =============================================================================

/// Void (padding).
pub const VOID: u32 = 0xEC;
/// CRC-32.
pub const CRC32: u32 = 0xBF;

// =============================================================================
// Segment and meta seek
// =============================================================================

/// Segment.
pub const SEGMENT: u32 = 0x18538067;
/// SeekHead.
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Seek entry.
pub const SEEK: u32 = 0x4DBB;
/// SeekID.
pub const SEEK_ID: u32 = 0x53AB;
/// SeekPosition (relative to the first byte after the Segment header).
pub const SEEK_POSITION: u32 = 0x53AC;

// =============================================================================
// Segment info
// =============================================================================

/// Info.
pub const INFO: u32 = 0x1549A966;
/// TimestampScale (ns per timestamp unit).
pub const TIMESTAMP_SCALE: u32 = 0x2AD7B1;
/// Duration (in timestamp units).
pub const DURATION: u32 = 0x4489;
/// Title.
pub const TITLE: u32 = 0x7BA9;
/// MuxingApp.
pub const MUXING_APP: u32 = 0x4D80;
/// WritingApp.
pub const WRITING_APP: u32 = 0x5741;
/// SegmentUID.
pub const SEGMENT_UID: u32 = 0x73A4;
/// DateUTC (ns since 2001-01-01).
pub const DATE_UTC: u32 = 0x4461;

// =============================================================================
// Cluster / cues (indexed, never rewritten in place)
// =============================================================================

/// Cluster.
pub const CLUSTER: u32 = 0x1F43B675;
/// Cues.
pub const CUES: u32 = 0x1C53BB6B;
/// CuePoint.
pub const CUE_POINT: u32 = 0xBB;
/// CueTime.
pub const CUE_TIME: u32 = 0xB3;
/// CueTrackPositions.
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// CueTrack.
pub const CUE_TRACK: u32 = 0xF7;
/// CueClusterPosition.
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
/// CueRelativePosition.
pub const CUE_RELATIVE_POSITION: u32 = 0xF0;

// =============================================================================
// Tracks
// =============================================================================

/// Tracks.
pub const TRACKS: u32 = 0x1654AE6B;
/// TrackEntry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// TrackNumber.
pub const TRACK_NUMBER: u32 = 0xD7;
/// TrackUID.
pub const TRACK_UID: u32 = 0x73C5;
/// TrackType (1 video, 2 audio, 17 subtitle, ...).
pub const TRACK_TYPE: u32 = 0x83;
/// FlagEnabled.
pub const FLAG_ENABLED: u32 = 0xB9;
/// FlagDefault.
pub const FLAG_DEFAULT: u32 = 0x88;
/// FlagForced.
pub const FLAG_FORCED: u32 = 0x55AA;
/// FlagLacing.
pub const FLAG_LACING: u32 = 0x9C;
/// DefaultDuration (ns per frame).
pub const DEFAULT_DURATION: u32 = 0x23E383;
/// Name.
pub const TRACK_NAME: u32 = 0x536E;
/// Language (ISO-639-2).
pub const TRACK_LANGUAGE: u32 = 0x22B59C;
/// CodecID.
pub const CODEC_ID: u32 = 0x86;
/// CodecPrivate.
pub const CODEC_PRIVATE: u32 = 0x63A2;
/// CodecName.
pub const CODEC_NAME: u32 = 0x258688;
/// ContentEncodings (presence of ContentEncryption marks the track encrypted).
pub const CONTENT_ENCODINGS: u32 = 0x6D80;
/// ContentEncoding.
pub const CONTENT_ENCODING: u32 = 0x6240;
/// ContentEncryption.
pub const CONTENT_ENCRYPTION: u32 = 0x5035;

/// Video settings.
pub const VIDEO: u32 = 0xE0;
/// PixelWidth.
pub const PIXEL_WIDTH: u32 = 0xB0;
/// PixelHeight.
pub const PIXEL_HEIGHT: u32 = 0xBA;
/// DisplayWidth.
pub const DISPLAY_WIDTH: u32 = 0x54B0;
/// DisplayHeight.
pub const DISPLAY_HEIGHT: u32 = 0x54BA;
/// FlagInterlaced.
pub const FLAG_INTERLACED: u32 = 0x9A;
/// ColourSpace.
pub const COLOUR_SPACE: u32 = 0x2EB524;

/// Audio settings.
pub const AUDIO: u32 = 0xE1;
/// SamplingFrequency.
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
/// OutputSamplingFrequency.
pub const OUTPUT_SAMPLING_FREQUENCY: u32 = 0x78B5;
/// Channels.
pub const CHANNELS: u32 = 0x9F;
/// BitDepth.
pub const BIT_DEPTH: u32 = 0x6264;

// =============================================================================
// Tags
// =============================================================================

/// Tags.
pub const TAGS: u32 = 0x1254C367;
/// Tag.
pub const TAG: u32 = 0x7373;
/// Targets.
pub const TARGETS: u32 = 0x63C0;
/// TargetTypeValue (10..70).
pub const TARGET_TYPE_VALUE: u32 = 0x68CA;
/// TargetType (string form).
pub const TARGET_TYPE: u32 = 0x63CA;
/// TagTrackUID.
pub const TAG_TRACK_UID: u32 = 0x63C5;
/// TagEditionUID.
pub const TAG_EDITION_UID: u32 = 0x63C9;
/// TagChapterUID.
pub const TAG_CHAPTER_UID: u32 = 0x63C4;
/// TagAttachmentUID.
pub const TAG_ATTACHMENT_UID: u32 = 0x63C6;
/// SimpleTag.
pub const SIMPLE_TAG: u32 = 0x67C8;
/// TagName.
pub const TAG_NAME: u32 = 0x45A3;
/// TagLanguage.
pub const TAG_LANGUAGE: u32 = 0x447A;
/// TagDefault.
pub const TAG_DEFAULT: u32 = 0x4484;
/// TagString.
pub const TAG_STRING: u32 = 0x4487;
/// TagBinary.
pub const TAG_BINARY: u32 = 0x4485;

// =============================================================================
// Attachments
// =============================================================================

/// Attachments.
pub const ATTACHMENTS: u32 = 0x1941A469;
/// AttachedFile.
pub const ATTACHED_FILE: u32 = 0x61A7;
/// FileDescription.
pub const FILE_DESCRIPTION: u32 = 0x467E;
/// FileName.
pub const FILE_NAME: u32 = 0x466E;
/// FileMediaType (historically FileMimeType).
pub const FILE_MIME_TYPE: u32 = 0x4660;
/// FileData.
pub const FILE_DATA: u32 = 0x465C;
/// FileUID.
pub const FILE_UID: u32 = 0x46AE;

// =============================================================================
// Chapters
// =============================================================================

/// Chapters.
pub const CHAPTERS: u32 = 0x1043A770;
/// EditionEntry.
pub const EDITION_ENTRY: u32 = 0x45B9;
/// EditionUID.
pub const EDITION_UID: u32 = 0x45BC;
/// EditionFlagHidden.
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
/// EditionFlagDefault.
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
/// EditionFlagOrdered.
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;
/// ChapterAtom.
pub const CHAPTER_ATOM: u32 = 0xB6;
/// ChapterUID.
pub const CHAPTER_UID: u32 = 0x73C4;
/// ChapterTimeStart (ns).
pub const CHAPTER_TIME_START: u32 = 0x91;
/// ChapterTimeEnd (ns).
pub const CHAPTER_TIME_END: u32 = 0x92;
/// ChapterFlagHidden.
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
/// ChapterFlagEnabled.
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
/// ChapterDisplay.
pub const CHAPTER_DISPLAY: u32 = 0x80;
/// ChapString.
pub const CHAP_STRING: u32 = 0x85;
/// ChapLanguage.
pub const CHAP_LANGUAGE: u32 = 0x437C;
/// ChapCountry.
pub const CHAP_COUNTRY: u32 = 0x437E;

/// Human-readable name for a top-level element, for diagnostics.
pub fn top_level_name(id: u32) -> &'static str {
    match id {
        EBML => "EBML",
        SEGMENT => "Segment",
        SEEK_HEAD => "SeekHead",
        INFO => "Info",
        TRACKS => "Tracks",
        CLUSTER => "Cluster",
        CUES => "Cues",
        TAGS => "Tags",
        ATTACHMENTS => "Attachments",
        CHAPTERS => "Chapters",
        VOID => "Void",
        _ => "unknown",
    }
}
