//! Runtime protections and dead code placed into the output program

use super::names::NameGenerator;
use rand::distributions::Alphanumeric;
use rand::Rng;

fn word<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Replace the common `console` methods with no-ops.
pub fn disable_console_output<R: Rng>(names: &mut NameGenerator, rng: &mut R) -> String {
    let (g, c, n, l, j) = (
        names.next(rng),
        names.next(rng),
        names.next(rng),
        names.next(rng),
        names.next(rng),
    );
    format!(
        "(function(){{var {g}=typeof globalThis!=='undefined'?globalThis:typeof window!=='undefined'?window:\
         typeof global!=='undefined'?global:{{}};var {c}={g}['console']={g}['console']||{{}};\
         var {n}=function(){{}};var {l}=['log','warn','info','error','exception','table','trace'];\
         for(var {j}=0x0;{j}<{l}['length'];{j}++){{{c}[{l}[{j}]]={n};}}}})();"
    )
}

/// Trip any attached debugger, once and then every `interval` milliseconds.
///
/// The timer is `unref`'d so it never keeps a Node.js process alive.
pub fn debug_protection<R: Rng>(interval: u64, names: &mut NameGenerator, rng: &mut R) -> String {
    let (d, e, t) = (names.next(rng), names.next(rng), names.next(rng));
    let repeat = if interval > 0 {
        format!(
            "if(typeof setInterval==='function'){{var {t}=setInterval({d},0x{interval:x});\
             if({t}&&typeof {t}['unref']==='function'){{{t}['unref']();}}}}"
        )
    } else {
        String::new()
    };
    format!(
        "(function(){{var {d}=function(){{try{{(function(){{}})['constructor']('debugger')();}}\
         catch({e}){{}}}};{d}();{repeat}}})();"
    )
}

/// Stop working once the output has been reformatted.
///
/// A function's source text is compared with the exact text emitted here;
/// any beautifier changes it and the check spins forever.
pub fn self_defending<R: Rng>(names: &mut NameGenerator, rng: &mut R) -> String {
    let (f, p) = (names.next(rng), names.next(rng));
    let marker = word(rng, 6);
    format!(
        "(function(){{var {f}=function(){{return'{marker}';}};\
         var {p}=/^function\\(\\)\\{{return'{marker}';\\}}$/;\
         if(!{p}['test']({f}['toString']())){{for(;;){{}}}}}})();"
    )
}

/// A branch whose condition is always false, for the start of a block.
pub fn dead_branch<R: Rng>(names: &mut NameGenerator, rng: &mut R) -> String {
    let name = names.next(rng);
    match rng.gen_range(0..3) {
        0 => {
            let (a, b) = (word(rng, 5), word(rng, 5));
            let b = if a == b { format!("{}x", b) } else { b };
            format!(
                "if('{a}'==='{b}'){{var {name}='{}'+0x{:x};}}",
                word(rng, 8),
                rng.gen_range(0..0xffff)
            )
        }
        1 => {
            let low = rng.gen_range(0..0x800);
            let high = low + rng.gen_range(1..0x800);
            format!(
                "if(0x{low:x}>0x{high:x}){{var {name}=function(){{return'{}';}};}}",
                word(rng, 6)
            )
        }
        _ => {
            let value = rng.gen_range(0..0x1000);
            format!(
                "if(0x{value:x}!==0x{value:x}){{var {name}=[0x{:x},'{}'];}}",
                rng.gen_range(0..0x1000),
                word(rng, 4)
            )
        }
    }
}
