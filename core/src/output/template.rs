//! Fixed parts of the replay program

/// Decodes embedded payload text into a typed array.
///
/// Fails loudly on malformed text: a corrupt recording must not replay
/// with wrong bytes.
pub const DECODE_ROUTINE: &str = r#"const BASE64_ALPHABET = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const BASE64_LOOKUP = new Map(Array.from(BASE64_ALPHABET, (c, i) => [c, i]));

function decodeBase64(text, ArrayType) {
    if (text.length % 4 !== 0) {
        throw new Error(`Invalid base64 length: ${text.length}`);
    }
    let padding = 0;
    if (text.endsWith("==")) {
        padding = 2;
    } else if (text.endsWith("=")) {
        padding = 1;
    }
    const body = text.length - padding;
    const bytes = new Uint8Array((text.length / 4) * 3 - padding);
    let out = 0;
    for (let i = 0; i < text.length; i += 4) {
        let chunk = 0;
        for (let j = i; j < i + 4; j++) {
            let sextet = 0;
            if (j < body) {
                if (text[j] === "=") {
                    throw new Error(`Invalid base64 padding at ${j}`);
                }
                sextet = BASE64_LOOKUP.get(text[j]);
                if (sextet === undefined) {
                    throw new Error(`Invalid base64 character at ${j}`);
                }
            }
            chunk = (chunk << 6) | sextet;
        }
        for (const byte of [(chunk >> 16) & 0xff, (chunk >> 8) & 0xff, chunk & 0xff]) {
            if (out < bytes.length) {
                bytes[out++] = byte;
            }
        }
    }
    return new ArrayType(bytes.buffer);
}"#;

/// Runs initialization once, then one frame routine per display refresh
pub const DRIVER: &str = r#"let nextFrame = 0;

async function advance() {
    const index = nextFrame++;
    const start = performance.now();
    try {
        await frames[index]();
    } catch (error) {
        console.error(`Frame ${index}: ${error}`);
    }
    console.log(`Frame ${index}: ${(performance.now() - start).toFixed(2)} ms`);
    if (nextFrame < frames.length) {
        requestAnimationFrame(advance);
    }
}

async function main() {
    try {
        await initialize();
    } catch (error) {
        console.error(`Initialization: ${error}`);
        return;
    }
    if (frames.length > 0) {
        requestAnimationFrame(advance);
    }
}"#;
